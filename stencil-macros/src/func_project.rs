use crate::prelude::*;
use syn::ext::IdentExt;

struct Input {
    schema: Expr,
    entries: Punctuated<Entry, Token![,]>,
}

impl Parse for Input {
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

/// `name`, `-name`, `+name` or `!name`, with `.` separated nested paths.
struct Entry {
    marker: Option<char>,
    path: Vec<Ident>,
}

impl Parse for Entry {
    fn parse(input: ParseStream) -> Result<Self> {
        let marker = if input.peek(Token![-]) {
            input.parse::<Token![-]>()?;
            Some('-')
        } else if input.peek(Token![+]) {
            input.parse::<Token![+]>()?;
            Some('+')
        } else if input.peek(Token![!]) {
            input.parse::<Token![!]>()?;
            Some('!')
        } else {
            None
        };

        let mut path = vec![Ident::parse_any(input)?];
        while input.peek(Token![.]) {
            input.parse::<Token![.]>()?;
            path.push(Ident::parse_any(input)?);
        }

        Ok(Self { marker, path })
    }
}

impl Entry {
    fn literal(&self) -> LitStr {
        let path = self
            .path
            .iter()
            .map(|ident| {
                let ident = ident.to_string();
                ident.strip_prefix("r#").map(str::to_owned).unwrap_or(ident)
            })
            .join(".");

        let literal = match self.marker {
            Some(marker) => format!("{marker}{path}"),
            None => path,
        };

        LitStr::new(&literal, self.path[0].span())
    }
}

pub fn func_project(input: TokenStream) -> Result<TokenStream> {
    let Input { schema, entries } = parse2(input)?;
    let krate = krate()?;

    let names = entries.iter().map(Entry::literal).collect_vec();
    let count = names.len();

    Ok(quote! {
        {
            let names: [&'static str; #count] = [ #( #names ),* ];
            #krate::query::projection(&#schema, names, ::std::iter::empty::<&'static str>())
        }
    })
}
