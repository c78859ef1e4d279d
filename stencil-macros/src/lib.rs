#[warn(clippy::pedantic)]
mod func_filter;
mod func_project;
mod func_update;
mod prelude;
mod utils;

fn expand<F: FnOnce(proc_macro2::TokenStream) -> syn::Result<proc_macro2::TokenStream>>(
    fun: F,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    fun(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// `filter!(schema, age__gte: 18, not__name__re: "^admin")`
#[proc_macro]
pub fn filter(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(func_filter::func_filter, input)
}

/// `update!(schema, inc__visits: 1, name: "Alice")`
#[proc_macro]
pub fn update(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(func_update::func_update, input)
}

/// `project!(schema, name, -password)`
#[proc_macro]
pub fn project(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(func_project::func_project, input)
}
