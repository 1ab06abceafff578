#[allow(unused_imports)]
use super::*;

pub(crate) struct ParsedDocument {
    name: Ident,
    collection: String,
    id_field: Ident,
    created_at_field: String,
    expires_at_field: Option<String>,
    hidden_when: Option<String>,
    fields: Vec<ParsedField>,
    index_together: Vec<Vec<String>>,
}

impl ParsedDocument {
    pub(crate) fn from_input(input: &DeriveInput) -> Result<Self> {
        let mut collection: Option<String> = None;
        let mut hidden_when: Option<String> = None;
        let mut index_together: Vec<Vec<String>> = Vec::new();

        for attr in &input.attrs {
            if attr.path().is_ident("document") {
                Self::parse_container_attr(attr, &mut collection, &mut hidden_when, &mut index_together)?;
            }
        }

        let collection = collection.ok_or_else(|| {
            Error::new(
                input.ident.span(),
                "Document requires #[document(collection = \"...\")] on the struct",
            )
        })?;

        let fields = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => named
                    .named
                    .iter()
                    .map(ParsedField::from_field)
                    .collect::<Result<Vec<_>>>()?,
                _ => return Err(Error::new(input.ident.span(), "Document requires named fields")),
            },
            _ => return Err(Error::new(input.ident.span(), "Document can only be derived for structs")),
        };

        let id_field = single_marked(&fields, |f| f.is_id, input, "id")?
            .map(|f| f.ident.clone())
            .ok_or_else(|| Error::new(input.ident.span(), "Document requires a field annotated with #[document(id)]"))?;
        let created_at_field = single_marked(&fields, |f| f.is_created_at, input, "created_at")?
            .map(|f| f.name.clone())
            .ok_or_else(|| {
                Error::new(
                    input.ident.span(),
                    "Document requires a field annotated with #[document(created_at)]",
                )
            })?;
        let expires_at_field = single_marked(&fields, |f| f.is_expires_at, input, "expires_at")?.map(|f| f.name.clone());

        let known = |name: &str| fields.iter().any(|f| f.name == name);
        if let Some(flag) = &hidden_when
            && !known(flag)
        {
            return Err(Error::new(
                input.ident.span(),
                format!("hidden_when refers to unknown field `{flag}`"),
            ));
        }
        for group in &index_together {
            if group.is_empty() {
                return Err(Error::new(input.ident.span(), "index_together requires at least one field"));
            }
            if let Some(missing) = group.iter().find(|name| !known(name)) {
                return Err(Error::new(
                    input.ident.span(),
                    format!("index_together refers to unknown field `{missing}`"),
                ));
            }
        }

        Ok(Self {
            name: input.ident.clone(),
            collection,
            id_field,
            created_at_field,
            expires_at_field,
            hidden_when,
            fields,
            index_together,
        })
    }

    fn parse_container_attr(
        attr: &Attribute,
        collection: &mut Option<String>,
        hidden_when: &mut Option<String>,
        index_together: &mut Vec<Vec<String>>,
    ) -> Result<()> {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                *collection = Some(value.value());
            } else if meta.path.is_ident("hidden_when") {
                let value: LitStr = meta.value()?.parse()?;
                *hidden_when = Some(value.value());
            } else if meta.path.is_ident("index_together") {
                let value: ExprArray = meta.value()?.parse()?;
                index_together.push(string_array(&value)?);
            } else {
                return Err(meta.error("unknown document container attribute"));
            }
            Ok(())
        })
    }

    pub(crate) fn emit(&self) -> TokenStream2 {
        let name = &self.name;
        let type_name = LitStr::new(&name.to_string(), Span::call_site());
        let collection = LitStr::new(&self.collection, Span::call_site());
        let id_ident = &self.id_field;
        let score_field = LitStr::new(&self.created_at_field, Span::call_site());

        let unique_specs: Vec<TokenStream2> = self.fields.iter().filter_map(ParsedField::unique_tokens).collect();

        let mut index_groups: Vec<Vec<String>> = self
            .fields
            .iter()
            .filter(|f| f.is_indexed)
            .map(|f| vec![f.name.clone()])
            .collect();
        index_groups.extend(self.index_together.iter().cloned());
        let index_specs = index_groups.iter().map(|group| {
            let lits = group.iter().map(|field| LitStr::new(field, Span::call_site()));
            quote! {
                ::wayfarer::types::IndexSpec {
                    fields: ::std::vec![#(#lits),*],
                }
            }
        });

        let hidden_when = option_lit(self.hidden_when.as_deref());
        let expires_field = option_lit(self.expires_at_field.as_deref());

        quote! {
            impl ::wayfarer::types::Document for #name {
                const COLLECTION: &'static str = #collection;

                fn id(&self) -> &str {
                    &self.#id_ident
                }

                fn schema() -> ::wayfarer::types::DocumentSchema {
                    ::wayfarer::types::DocumentSchema {
                        collection: #collection,
                        score_field: #score_field,
                        unique: ::std::vec![#(#unique_specs),*],
                        indexes: ::std::vec![#(#index_specs),*],
                        hidden_when: #hidden_when,
                        expires_field: #expires_field,
                    }
                }
            }

            ::wayfarer::inventory::submit! {
                ::wayfarer::types::DocumentRegistration {
                    type_name: #type_name,
                    collection: #collection,
                    schema: <#name as ::wayfarer::types::Document>::schema,
                }
            }
        }
    }
}

fn single_marked<'a>(
    fields: &'a [ParsedField],
    predicate: impl Fn(&ParsedField) -> bool,
    input: &DeriveInput,
    attr_name: &str,
) -> Result<Option<&'a ParsedField>> {
    let mut marked = fields.iter().filter(|f| predicate(f));
    let first = marked.next();
    if marked.next().is_some() {
        return Err(Error::new(
            input.ident.span(),
            format!("Document allows exactly one #[document({attr_name})] field"),
        ));
    }
    Ok(first)
}

fn option_lit(value: Option<&str>) -> TokenStream2 {
    match value {
        Some(value) => {
            let lit = LitStr::new(value, Span::call_site());
            quote! { ::std::option::Option::Some(#lit) }
        }
        None => quote! { ::std::option::Option::None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn parses_flags_and_index_groups() {
        let input: DeriveInput = parse_quote! {
            #[document(collection = "users", index_together = ["account_type", "username"])]
            struct User {
                #[document(id)]
                id: String,
                #[document(unique(case_insensitive), index)]
                username: String,
                account_type: String,
                #[document(created_at)]
                created_at: DateTime<Utc>,
                #[document(expires_at)]
                expires_at: Option<DateTime<Utc>>,
            }
        };
        let parsed = ParsedDocument::from_input(&input).unwrap();
        assert_eq!(parsed.collection, "users");
        assert_eq!(parsed.id_field, "id");
        assert_eq!(parsed.created_at_field, "created_at");
        assert_eq!(parsed.expires_at_field.as_deref(), Some("expires_at"));
        assert_eq!(parsed.index_together, vec![vec!["account_type".to_string(), "username".to_string()]]);
        let username = parsed.fields.iter().find(|f| f.name == "username").unwrap();
        assert_eq!(username.unique, Some(true));
        assert!(username.is_indexed);
    }

    #[test]
    fn rejects_missing_collection_and_unknown_groups() {
        let no_collection: DeriveInput = parse_quote! {
            struct Note {
                #[document(id)]
                id: String,
                #[document(created_at)]
                created_at: DateTime<Utc>,
            }
        };
        assert!(ParsedDocument::from_input(&no_collection).is_err());

        let unknown_group: DeriveInput = parse_quote! {
            #[document(collection = "notes", index_together = ["owner"])]
            struct Note {
                #[document(id)]
                id: String,
                #[document(created_at)]
                created_at: DateTime<Utc>,
            }
        };
        let err = ParsedDocument::from_input(&unknown_group).err().unwrap();
        assert!(err.to_string().contains("unknown field `owner`"));
    }

    #[test]
    fn id_must_be_a_string() {
        let input: DeriveInput = parse_quote! {
            #[document(collection = "notes")]
            struct Note {
                #[document(id)]
                id: u64,
                #[document(created_at)]
                created_at: DateTime<Utc>,
            }
        };
        assert!(ParsedDocument::from_input(&input).is_err());
    }
}
