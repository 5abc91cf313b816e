use proc_macro2::{Ident, Span, TokenStream, TokenTree};
use quote::quote;
use syn::punctuated::Punctuated;
use syn::token::Plus;
use syn::{parse_macro_input, Data, DataEnum, DataUnion, DeriveInput, Error, Meta, MetaList, Path, PathSegment, PredicateType, TraitBound, TypeParamBound};

fn trait_bound(path: &[&str]) -> TypeParamBound {
	let mut bound = TraitBound {
		lifetimes: None,
		paren_token: None,
		modifier: syn::TraitBoundModifier::None,
		path: Path {
			leading_colon: Some(Default::default()),
			segments: Punctuated::new(),
		},
	};

	for ident in path {
		bound.path.segments.push(PathSegment {
			ident: Ident::new(ident, Span::call_site()),
			arguments: syn::PathArguments::None,
		})
	}

	bound.into()
}

/// Derives `utils::bytes::Cast` for a `repr(C)`/`repr(packed)`/`repr(transparent)` struct whose
/// fields are themselves all `Cast`. For `repr(C)` structs (the common case for wire formats)
/// this also emits a const assertion that the struct has no padding, since padding bytes would
/// make reading the struct from an arbitrary byte buffer unsound.
#[proc_macro_derive(Cast)]
pub fn bytes(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let DeriveInput { attrs, ident: name, generics, data, .. } = parse_macro_input!(item as DeriveInput);

	// Whether either "C" or "transparent" have been seen.
	let mut base = false;
	// One of "C", "packed", or "transparent".
	let mut repr = "C";

	for attr in attrs {
		if let Meta::List(MetaList { path, tokens, .. }) = attr.meta {
			if path.is_ident("repr") {
				let mut last_was_delim = true;

				for token in tokens.into_iter() {
					match token {
						TokenTree::Punct(punct) if !last_was_delim && punct.as_char() == ',' => {
							last_was_delim = true;
							continue;
						}
						TokenTree::Ident(ident) if last_was_delim && ident == "C" => base = true,
						TokenTree::Ident(ident) if last_was_delim && ident == "transparent" => {
							base = true;
							repr = "transparent";
						}
						TokenTree::Ident(ident) if last_was_delim && ident == "packed" => {
							base = true;
							repr = "packed";
						}
						_ => return Error::new(token.span(), "Unexpected token").to_compile_error().into(),
					}

					last_was_delim = false;
				}
			}
		}
	}

	if !base {
		return Error::new(Span::call_site(), "Struct needs explicit repr(C), repr(packed), or repr(transparent)")
			.to_compile_error()
			.into();
	}

	// repr(C) can have trailing padding; repr(packed)/repr(transparent) cannot.
	let needs_size_check = repr == "C";

	let mut cast_predicates = generics.where_clause.as_ref().map(|x| x.predicates.clone()).unwrap_or_default();
	let (impl_generics, ty_generics, _) = generics.split_for_impl();

	let mut fields_size = Punctuated::<TokenStream, Plus>::new();

	match data {
		Data::Struct(obj) => {
			for field in obj.fields.into_iter() {
				let ty = field.ty;

				if needs_size_check {
					fields_size.push(quote! { ::core::mem::size_of::<#ty>() });
				}

				let mut cast_predicate = PredicateType {
					bounded_ty: ty,
					lifetimes: None,
					colon_token: Default::default(),
					bounds: Punctuated::new(),
				};

				cast_predicate.bounds.push(trait_bound(&["utils", "bytes", "Cast"]));
				cast_predicates.push(cast_predicate.into());
			}
		}
		Data::Enum(DataEnum { enum_token, .. }) => return Error::new_spanned(enum_token, "Enums are not supported.").to_compile_error().into(),
		Data::Union(DataUnion { union_token, .. }) => return Error::new_spanned(union_token, "Unions are not supported.").to_compile_error().into(),
	};

	let no_padding_check = if fields_size.is_empty() {
		TokenStream::new()
	} else {
		quote! {
			const _: () = ::core::assert!(::core::mem::size_of::<#name #ty_generics>() == #fields_size);
		}
	};

	quote! {
		unsafe impl #impl_generics ::utils::bytes::Cast for #name #ty_generics where #cast_predicates {}

		#no_padding_check
	}
	.into()
}
