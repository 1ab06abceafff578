use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Expr, ExprArray, ExprLit, Field, Fields, Ident, Lit, LitStr, Result, Type,
    parse_macro_input, spanned::Spanned,
};

mod parsed;

use parsed::ParsedDocument;

/// Derives `wayfarer::types::Document` for a serde struct.
///
/// Container attributes:
/// - `collection = "posts"` (required)
/// - `index_together = ["owner", "post_type"]` (repeatable)
/// - `hidden_when = "is_deleted"`: a bool field that removes the document from
///   every secondary index while it is `true`
///
/// Field attributes:
/// - `id`, `created_at`, `expires_at`
/// - `unique` / `unique(case_insensitive)`
/// - `index`
///
/// ```text
/// #[derive(Document, Serialize, Deserialize)]
/// #[document(collection = "comments", index_together = ["post", "parent_comment"], hidden_when = "is_deleted")]
/// pub struct Comment {
///     #[document(id)]
///     pub id: String,
///     #[document(index)]
///     pub parent_comment: Option<String>,
///     #[document(created_at)]
///     pub created_at: DateTime<Utc>,
///     ...
/// }
/// ```
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match ParsedDocument::from_input(&input) {
        Ok(parsed) => parsed.emit().into(),
        Err(err) => err.to_compile_error().into(),
    }
}
