use crate::prelude::*;
use proc_macro_crate::{FoundCrate, crate_name};
use syn::ext::IdentExt;

pub fn krate() -> Result<TokenStream> {
    let found = crate_name("stencil").map_err(|e| Error::new(Span::call_site(), e))?;

    Ok(match found {
        FoundCrate::Itself => quote! { ::stencil },
        FoundCrate::Name(name) => {
            let ident = Ident::new(&name, Span::call_site());
            quote! { ::#ident }
        }
    })
}

/// `schema, key: value, ...` as accepted by `filter!` and `update!`.
pub struct KeywordInput {
    pub schema: Expr,
    pub entries: Punctuated<Keyword, Token![,]>,
}

impl Parse for KeywordInput {
    fn parse(input: ParseStream) -> Result<Self> {
        let schema = input.parse()?;

        let entries = if input.is_empty() {
            Punctuated::new()
        } else {
            input.parse::<Token![,]>()?;
            Punctuated::parse_terminated(input)?
        };

        Ok(Self { schema, entries })
    }
}

pub struct Keyword {
    pub key: Ident,
    pub value: Expr,
}

impl Parse for Keyword {
    fn parse(input: ParseStream) -> Result<Self> {
        let key = Ident::parse_any(input)?;
        input.parse::<Token![:]>()?;
        let value = input.parse()?;

        Ok(Self { key, value })
    }
}

impl Keyword {
    /// Key as written, without a raw identifier prefix.
    pub fn name(&self) -> LitStr {
        let key = self.key.to_string();
        let key = key.strip_prefix("r#").unwrap_or(&key);
        LitStr::new(key, self.key.span())
    }
}

/// Expands to `path(&schema, [(key, Value::from(value)), ...])`.
pub fn keyword_call(input: &KeywordInput, function: &TokenStream) -> Result<TokenStream> {
    let krate = krate()?;
    let schema = &input.schema;
    let count = input.entries.len();

    let pairs = input
        .entries
        .iter()
        .map(|entry| {
            let name = entry.name();
            let value = &entry.value;
            quote! { (#name, #krate::Value::from(#value)) }
        })
        .collect_vec();

    Ok(quote! {
        {
            let pairs: [(&'static str, #krate::Value); #count] = [ #( #pairs ),* ];
            #function(&#schema, pairs)
        }
    })
}
