#[allow(unused_imports)]
use super::*;

pub(crate) struct ParsedField {
    pub(crate) ident: Ident,
    pub(crate) name: String,
    pub(crate) is_id: bool,
    pub(crate) is_created_at: bool,
    pub(crate) is_expires_at: bool,
    pub(crate) is_indexed: bool,
    /// `Some(case_insensitive)` when the field carries `#[document(unique)]`.
    pub(crate) unique: Option<bool>,
}

impl ParsedField {
    pub(crate) fn from_field(field: &Field) -> Result<Self> {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| Error::new(field.span(), "Document requires named fields"))?;
        let name = ident.to_string();

        let mut parsed = Self {
            ident,
            name,
            is_id: false,
            is_created_at: false,
            is_expires_at: false,
            is_indexed: false,
            unique: None,
        };

        for attr in &field.attrs {
            if attr.path().is_ident("document") {
                parsed.parse_field_attr(attr, &field.ty)?;
            }
        }

        Ok(parsed)
    }

    fn parse_field_attr(&mut self, attr: &Attribute, ty: &Type) -> Result<()> {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                if self.is_id {
                    return Err(meta.error("field already marked as #[document(id)]"));
                }
                if type_ident(ty).as_deref() != Some("String") {
                    return Err(meta.error("#[document(id)] requires a field of type String"));
                }
                self.is_id = true;
            } else if meta.path.is_ident("created_at") {
                if type_ident(ty).as_deref() != Some("DateTime") {
                    return Err(meta.error("#[document(created_at)] requires a chrono::DateTime<Tz> field"));
                }
                self.is_created_at = true;
            } else if meta.path.is_ident("expires_at") {
                let inner = option_inner(ty).unwrap_or(ty);
                if type_ident(inner).as_deref() != Some("DateTime") {
                    return Err(meta.error("#[document(expires_at)] requires a chrono::DateTime<Tz> field"));
                }
                self.is_expires_at = true;
            } else if meta.path.is_ident("index") {
                self.is_indexed = true;
            } else if meta.path.is_ident("unique") {
                let mut case_insensitive = false;
                if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|item| {
                        if item.path.is_ident("case_insensitive") {
                            case_insensitive = true;
                            Ok(())
                        } else {
                            Err(item.error("unknown unique option; expected `case_insensitive`"))
                        }
                    })?;
                }
                self.unique = Some(case_insensitive);
            } else {
                return Err(meta.error("unknown document field attribute"));
            }
            Ok(())
        })
    }

    pub(crate) fn unique_tokens(&self) -> Option<TokenStream2> {
        self.unique.map(|case_insensitive| {
            let field = LitStr::new(&self.name, Span::call_site());
            quote! {
                ::wayfarer::types::UniqueSpec {
                    field: #field,
                    case_insensitive: #case_insensitive,
                }
            }
        })
    }
}
