use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type, parse_macro_input, spanned::Spanned};

/// Derives `modelkit::Model` for a struct with named fields.
///
/// The identity field is the one named `id`, or the one marked `#[model(id)]`;
/// it must be an `Option<i64>`. Supported attributes:
///
/// - struct: `#[model(date_encoding = "double" | "timestamp" | "date" | "time")]`
/// - field: `#[model(id)]`, `#[model(skip)]` (not persisted, decoded as `Default`)
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_model(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_model(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Model does not support generic structs",
        ));
    }

    let model_options = parse_model_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Model can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Model requires named fields",
            ));
        }
    };

    let mut persisted = Vec::<PersistedField>::new();
    let mut skipped = Vec::<Ident>::new();
    let mut explicit_id: Option<Ident> = None;

    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Model requires named fields"))?;
        let options = parse_field_options(&field.attrs)?;

        if options.id {
            if options.skip {
                return Err(syn::Error::new(
                    field.span(),
                    "#[model(id)] cannot be combined with #[model(skip)]",
                ));
            }
            if explicit_id.is_some() {
                return Err(syn::Error::new(
                    field.span(),
                    "only one field can be marked #[model(id)]",
                ));
            }
            explicit_id = Some(ident.clone());
        }

        if options.skip {
            skipped.push(ident);
            continue;
        }

        persisted.push(PersistedField {
            name: column_name(&ident),
            ident,
            ty: field.ty,
        });
    }

    if persisted.is_empty() {
        return Err(syn::Error::new(
            struct_name.span(),
            "Model requires at least one persisted field",
        ));
    }

    let id_ident = match explicit_id {
        Some(ident) => ident,
        None => persisted
            .iter()
            .find(|field| field.name == "id")
            .map(|field| field.ident.clone())
            .ok_or_else(|| {
                syn::Error::new(
                    struct_name.span(),
                    "Model requires an `id: Option<i64>` field or a field marked #[model(id)]",
                )
            })?,
    };
    let id_name = column_name(&id_ident);
    let type_name = LitStr::new(&struct_name.to_string(), struct_name.span());

    let date_encoding = match model_options.date_encoding.as_deref() {
        None | Some("double") => quote!(::modelkit::DateEncoding::Double),
        Some("timestamp") => quote!(::modelkit::DateEncoding::Timestamp),
        Some("date") => quote!(::modelkit::DateEncoding::Date),
        Some("time") => quote!(::modelkit::DateEncoding::Time),
        Some(other) => {
            return Err(syn::Error::new(
                struct_name.span(),
                format!(
                    "unsupported date_encoding \"{other}\". Supported: double, timestamp, date, time"
                ),
            ));
        }
    };

    let names = persisted.iter().map(|field| field.name.as_str()).collect::<Vec<_>>();
    let idents = persisted.iter().map(|field| &field.ident).collect::<Vec<_>>();
    let types = persisted.iter().map(|field| &field.ty).collect::<Vec<_>>();

    Ok(quote! {
        impl ::modelkit::Model for #struct_name {
            const TYPE_NAME: &'static str = #type_name;
            const ID_FIELD: &'static str = #id_name;

            fn date_encoding() -> ::modelkit::DateEncoding {
                #date_encoding
            }

            fn entity_shape() -> ::modelkit::EntityShape {
                ::modelkit::EntityShape::Keyed(vec![
                    #( ::modelkit::FieldShape::new(
                        #names,
                        <#types as ::modelkit::FieldKind>::declared_type(),
                    ), )*
                ])
            }

            fn model_id(&self) -> ::core::option::Option<i64> {
                self.#id_ident
            }

            fn set_model_id(&mut self, id: ::core::option::Option<i64>) {
                self.#id_ident = id;
            }

            fn encode(
                &self,
                encoding: ::modelkit::DateEncoding,
            ) -> ::modelkit::Result<::modelkit::ValueMap> {
                let mut values = ::modelkit::ValueMap::new();
                #( ::modelkit::model::encode_field(&mut values, #names, &self.#idents, encoding)?; )*
                Ok(values)
            }

            fn decode(
                row: &::modelkit::Row,
                encoding: ::modelkit::DateEncoding,
            ) -> ::modelkit::Result<Self> {
                Ok(Self {
                    #( #idents: ::modelkit::model::decode_field(row, #names, encoding)?, )*
                    #( #skipped: ::core::default::Default::default(), )*
                })
            }
        }
    })
}

struct PersistedField {
    ident: Ident,
    name: String,
    ty: Type,
}

struct ModelOptions {
    date_encoding: Option<String>,
}

#[derive(Default)]
struct FieldOptions {
    id: bool,
    skip: bool,
}

fn column_name(ident: &Ident) -> String {
    ident.to_string().trim_start_matches("r#").to_string()
}

fn parse_model_options(attrs: &[syn::Attribute]) -> syn::Result<ModelOptions> {
    let mut options = ModelOptions {
        date_encoding: None,
    };

    for attr in attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("date_encoding") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.date_encoding = Some(lit.value());
                return Ok(());
            }

            Err(meta.error(
                "Unsupported model attribute. Supported: date_encoding = \"...\"",
            ))
        })?;
    }

    Ok(options)
}

fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                options.id = true;
                return Ok(());
            }

            if meta.path.is_ident("skip") {
                options.skip = true;
                return Ok(());
            }

            Err(meta.error("Unsupported #[model(...)] field option. Supported: id, skip"))
        })?;
    }

    Ok(options)
}
