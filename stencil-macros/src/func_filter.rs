use crate::{prelude::*, utils::{KeywordInput, keyword_call}};

pub fn func_filter(input: TokenStream) -> Result<TokenStream> {
    let input = parse2::<KeywordInput>(input)?;
    let krate = krate()?;

    keyword_call(&input, &quote! { #krate::query::filter })
}
