//! Procedural macros for the docmap project.
//!
//! This crate provides the `#[model]` attribute, which turns a plain struct into a model:
//!
//! - it reads the struct's fields and their `#[field(..)]` / `#[reference(..)]` configuration
//!   and generates the model's [`ModelDecl`](../docmap_core/decl/struct.ModelDecl.html),
//! - it rewrites that configuration into ordinary `serde` attributes so the struct's serde
//!   derives see plain fields,
//! - it adds an `id: ObjectId` primary key when no field is marked `primary`,
//! - it implements `Model`, deriving the schema once and caching it for the process lifetime.
//!
//! `#[model]` must be placed above the struct's `#[derive(..)]` attributes.

#[allow(unused_extern_crates)]
extern crate self as docmap_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Fields, ItemStruct, LitStr, Meta, Token,
    ext::IdentExt,
    meta::ParseNestedMeta,
    parse::Parser,
    parse_macro_input,
};

/// Maps a struct to documents.
///
/// ```ignore
/// #[model(collection = "people")]
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Person {
///     #[field(primary)]
///     pub handle: String,
///     #[field(key_name = "email_address")]
///     pub email: String,
///     #[field(default)]
///     pub visits: i64,
///     #[reference(key_name = "team_id")]
///     pub team: Team,
///     #[field(skip)]
///     pub cached: Option<String>,
/// }
/// ```
#[proc_macro_attribute]
pub fn model(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut options = ModelOptions::default();
    let parser = syn::meta::parser(|meta| options.parse(meta));
    parse_macro_input!(args with parser);

    let item = parse_macro_input!(input as ItemStruct);
    match expand(options, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct ModelOptions {
    collection: Option<LitStr>,
}

impl ModelOptions {
    fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("collection") {
            self.collection = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported model option"))
        }
    }
}

#[derive(Default)]
struct FieldArgs {
    primary: bool,
    key_name: Option<LitStr>,
    default: Option<Option<LitStr>>,
    skip: bool,
}

impl FieldArgs {
    fn parse(attr: &Attribute) -> syn::Result<Self> {
        let mut args = Self::default();
        if matches!(attr.meta, Meta::Path(_)) {
            return Ok(args);
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary") || meta.path.is_ident("primary_field") {
                args.primary = true;
            } else if meta.path.is_ident("key_name") {
                args.key_name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("default") {
                let path = if meta.input.peek(Token![=]) {
                    Some(meta.value()?.parse()?)
                } else {
                    None
                };
                args.default = Some(path);
            } else if meta.path.is_ident("skip") {
                args.skip = true;
            } else {
                return Err(meta.error("unsupported field option"));
            }
            Ok(())
        })?;
        Ok(args)
    }
}

#[derive(Default)]
struct ReferenceArgs {
    key_name: Option<LitStr>,
}

impl ReferenceArgs {
    fn parse(attr: &Attribute) -> syn::Result<Self> {
        let mut args = Self::default();
        if matches!(attr.meta, Meta::Path(_)) {
            return Ok(args);
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key_name") {
                args.key_name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported reference option"))
            }
        })?;
        Ok(args)
    }
}

/// What a field's own `#[serde(..)]` attributes do.
#[derive(Default)]
struct SerdeUsage {
    /// First option that changes how the field is named or shaped.
    foreign: Option<String>,
    default: bool,
    skip: bool,
}

impl SerdeUsage {
    fn inspect(&mut self, attr: &Attribute) -> syn::Result<()> {
        attr.parse_nested_meta(|meta| {
            let name = meta
                .path
                .get_ident()
                .map(ToString::to_string)
                .unwrap_or_default();
            match name.as_str() {
                "rename" | "alias" | "flatten" | "skip_serializing" | "skip_serializing_if"
                | "skip_deserializing" => {
                    self.foreign.get_or_insert(format!("serde({name})"));
                }
                "default" => self.default = true,
                "skip" => self.skip = true,
                _ => {}
            }
            skip_value(&meta)
        })
    }
}

/// Finds the first struct-level `#[serde(..)]` option that changes the keys fields are written
/// under. A struct-level `rename` only names the struct and is accepted.
fn model_serde_foreign(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut foreign = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            let name = meta
                .path
                .get_ident()
                .map(ToString::to_string)
                .unwrap_or_default();
            if matches!(
                name.as_str(),
                "rename_all" | "tag" | "transparent" | "from" | "try_from" | "into" | "remote"
            ) {
                foreign.get_or_insert(format!("serde({name})"));
            }
            skip_value(&meta)
        })?;
    }
    Ok(foreign)
}

fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<TokenStream2>()?;
    }
    Ok(())
}

fn is_reserved(name: &str) -> bool {
    name.starts_with("__") || name.ends_with("__")
}

fn expand(options: ModelOptions, mut item: ItemStruct) -> syn::Result<TokenStream2> {
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&item.generics, "models cannot be generic"));
    }
    let ident = item.ident.clone();
    let model_foreign = model_serde_foreign(&item.attrs)?;
    let Fields::Named(named) = &mut item.fields else {
        return Err(syn::Error::new_spanned(ident, "models must have named fields"));
    };

    let mut decls = Vec::new();
    let mut has_primary = false;
    let mut id_field = None;

    for field in named.named.iter_mut() {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let name = field_ident.unraw().to_string();
        let reserved = is_reserved(&name);
        let ty = &field.ty;

        let mut field_args = Vec::new();
        let mut reference_args = Vec::new();
        let mut serde = SerdeUsage::default();
        for attr in &field.attrs {
            if attr.path().is_ident("field") {
                field_args.push(FieldArgs::parse(attr)?);
            } else if attr.path().is_ident("reference") {
                reference_args.push(ReferenceArgs::parse(attr)?);
            } else if attr.path().is_ident("serde") {
                serde.inspect(attr)?;
            }
        }
        field
            .attrs
            .retain(|attr| !attr.path().is_ident("field") && !attr.path().is_ident("reference"));

        if name == "id" {
            id_field = Some(field_ident.clone());
        }

        let mut type_info = quote!(::docmap::decl::TypeInfo::of::<#ty>());
        let spec = if let Some(foreign) = serde.foreign {
            quote!(::docmap::decl::FieldSpec::Foreign(#foreign.to_string()))
        } else {
            match (field_args.as_slice(), reference_args.as_slice()) {
                ([], []) if serde.skip => quote!(::docmap::decl::FieldSpec::Skipped),
                ([], []) if serde.default => quote!(::docmap::decl::FieldSpec::Plain(
                    ::docmap::decl::FieldInfo::new().with_default()
                )),
                ([], []) => quote!(::docmap::decl::FieldSpec::Unconfigured),
                ([args], []) if args.skip => {
                    field.attrs.push(syn::parse_quote!(#[serde(skip)]));
                    quote!(::docmap::decl::FieldSpec::Skipped)
                }
                ([args], []) => {
                    has_primary |= args.primary && !reserved;
                    let primary = args.primary.then(|| quote!(.primary()));
                    let key_name = args.key_name.as_ref().map(|key| quote!(.key_name(#key)));
                    let default = match &args.default {
                        Some(None) => {
                            field.attrs.push(syn::parse_quote!(#[serde(default)]));
                            Some(quote!(.with_default()))
                        }
                        Some(Some(path)) => {
                            field.attrs.push(syn::parse_quote!(#[serde(default = #path)]));
                            Some(quote!(.with_default()))
                        }
                        None if serde.default => Some(quote!(.with_default())),
                        None => None,
                    };
                    quote!(::docmap::decl::FieldSpec::Plain(
                        ::docmap::decl::FieldInfo::new() #primary #key_name #default
                    ))
                }
                ([], [args]) => {
                    type_info = quote!(::docmap::decl::TypeInfo::model::<#ty>());
                    let key_name = args.key_name.as_ref().map(|key| quote!(.key_name(#key)));
                    quote!(::docmap::decl::FieldSpec::Reference(
                        ::docmap::decl::ReferenceInfo::new() #key_name
                    ))
                }
                _ => {
                    let detail = "a field may carry a single #[field] or #[reference] attribute";
                    quote!(::docmap::decl::FieldSpec::Unrecognized(#detail.to_string()))
                }
            }
        };

        if reserved && !serde.skip {
            field.attrs.push(syn::parse_quote!(#[serde(skip)]));
        }

        decls.push(quote!(::docmap::decl::FieldDecl::new(#name, #type_info, #spec)));
    }

    if !has_primary {
        if let Some(field_ident) = id_field {
            return Err(syn::Error::new_spanned(
                field_ident,
                "`id` is reserved for the generated primary key; mark a field with #[field(primary)]",
            ));
        }
        let id = syn::Field::parse_named.parse2(quote! {
            #[serde(default = "::docmap::registry::object_id")]
            pub id: ::docmap::bson::oid::ObjectId
        })?;
        named.named.push(id);
    }

    let model_name = ident.unraw().to_string();
    let collection = options.collection.map(|c| quote!(.collection(#c)));
    let foreign = model_foreign.map(|detail| quote!(.foreign(#detail)));

    Ok(quote! {
        #item

        impl ::docmap::model::Model for #ident {
            fn declaration() -> ::docmap::decl::ModelDecl {
                ::docmap::decl::ModelDecl::new(#model_name)
                    #collection
                    #foreign
                    #(.field(#decls))*
            }

            fn schema() -> &'static ::docmap::schema::Schema {
                static SCHEMA: ::std::sync::OnceLock<::docmap::schema::Schema> =
                    ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| {
                    ::docmap::model::register(<Self as ::docmap::model::Model>::declaration())
                })
            }
        }
    })
}
