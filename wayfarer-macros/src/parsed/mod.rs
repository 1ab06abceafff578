#[allow(unused_imports)]
use super::*;

mod document;
mod field;

pub(crate) use document::ParsedDocument;
pub(crate) use field::ParsedField;

/// Last path segment of a type, looking through `Option<T>` when asked.
pub(crate) fn type_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|segment| segment.ident.to_string()),
        _ => None,
    }
}

/// Returns the inner type when `ty` is `Option<T>`.
pub(crate) fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

pub(crate) fn string_array(expr: &ExprArray) -> Result<Vec<String>> {
    expr.elems
        .iter()
        .map(|elem| match elem {
            Expr::Lit(ExprLit { lit: Lit::Str(lit), .. }) => Ok(lit.value()),
            other => Err(Error::new(other.span(), "expected a string literal")),
        })
        .collect()
}
