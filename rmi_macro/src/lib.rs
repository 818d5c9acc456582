mod interface;
mod parser;

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{parse, parse_macro_input, parse_quote, Ident, ItemImpl, ItemTrait};

use interface::{RemoteMethod, RemoteTrait};

use crate::parser::parse_remote_trait;

macro_rules! my_compile_error {
    ($msg:expr) => {{
        return parse::Error::new(Span::call_site(), $msg)
            .into_compile_error()
            .into();
    }};
}

/// Macro to be used on a trait. It turns the trait into a remote interface:
/// a skeleton can serve any implementation of it, and `Stub<dyn Trait>`
/// implements it by calling the skeleton.
///
/// Example:
/// ```ignore
/// #[remote_interface]
/// pub trait Adder {
///     async fn add(&self, a: i32, b: i32) -> Result<i32, RmiError>;
///     async fn disp(&self, a: i32) -> Result<(), RmiError>;
/// }
/// ```
///
/// Every method must be `async`, take `&self` and owned, serializable
/// arguments, and return `Result<T, E>` where `E: RemoteError`.
#[proc_macro_attribute]
pub fn remote_interface(
    _args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let item = parse_macro_input!(input as ItemTrait);
    let remote_trait = match parse_remote_trait(&item) {
        Ok(x) => x,
        Err(e) => return e.into_compile_error().into(),
    };

    let trait_code = code_for_trait(item);
    let interface_code = code_for_remote_interface(&remote_trait);
    let stub_code = code_for_stub(&remote_trait);
    quote! {
        #trait_code
        #interface_code
        #stub_code
    }
    .into()
}

/// Macro to be used on each server object's implementation of a remote
/// interface.
///
/// Example:
/// ```ignore
/// struct MyAdder;
///
/// #[remote_impl]
/// impl Adder for MyAdder {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn remote_impl(
    _args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let original_input = TokenStream::from(input.clone());
    let input = parse_macro_input!(input as ItemImpl);
    if input.trait_.is_none() {
        my_compile_error!("#[remote_impl] should only be used on remote interface implementations.");
    }

    let internal = internal_path();
    quote! {
        #[#internal::async_trait]
        #original_input
    }
    .into()
}

fn internal_path() -> TokenStream {
    quote! { ::rmi_lib::internal_for_macro }
}

/// The trait itself, made shareable across tasks and async-callable through
/// trait objects.
fn code_for_trait(mut item: ItemTrait) -> TokenStream {
    let internal = internal_path();
    if item.colon_token.is_none() {
        item.colon_token = Some(Default::default());
    }
    item.supertraits.push(parse_quote!(::std::marker::Send));
    item.supertraits.push(parse_quote!(::std::marker::Sync));
    item.supertraits.push(parse_quote!('static));
    quote! {
        #[#internal::async_trait]
        #item
    }
}

fn code_for_remote_interface(remote_trait: &RemoteTrait) -> TokenStream {
    let internal = internal_path();
    let trait_name = &remote_trait.name;
    let trait_name_str = trait_name.to_string();

    let method_descriptors = remote_trait.methods.iter().map(|method| {
        let method_name = method.name.to_string();
        let param_types = method.param_type_names();
        let err_type = &method.err_type;
        let return_type = match method.return_type_name() {
            Some(name) => quote! { ::std::option::Option::Some(#name) },
            None => quote! { ::std::option::Option::None },
        };
        quote! {
            #internal::MethodDescriptor::new(
                #method_name,
                &[#(#param_types),*],
                #return_type,
                <#err_type as #internal::RemoteError>::DECLARED,
            )
        }
    });

    let handlers = remote_trait.methods.iter().map(|method| {
        let method_ident = &method.name;
        let method_name = method.name.to_string();
        let param_types = method.param_type_names();
        let arg_idents = arg_idents(method);
        let arg_types = &method.params;
        let encode = if method.is_void() {
            quote! { encode_void_outcome }
        } else {
            quote! { encode_outcome }
        };
        quote! {
            table.insert(
                #method_name,
                &[#(#param_types),*],
                ::std::boxed::Box::new(
                    |server: ::std::sync::Arc<Self>,
                     arguments: #internal::Bytes|
                     -> #internal::BoxFuture<'static, #internal::Reply> {
                        ::std::boxed::Box::pin(async move {
                            let (#(#arg_idents,)*): (#(#arg_types,)*) =
                                match #internal::decode_arguments(&arguments) {
                                    ::std::result::Result::Ok(decoded) => decoded,
                                    ::std::result::Result::Err(failure) => {
                                        return #internal::Reply::Failure(failure)
                                    }
                                };
                            #internal::#encode(server.#method_ident(#(#arg_idents),*).await)
                        })
                    },
                ),
            );
        }
    });

    quote! {
        impl #internal::RemoteInterface for dyn #trait_name {
            fn descriptor() -> #internal::RemoteInterfaceDescriptor {
                #internal::RemoteInterfaceDescriptor::new(
                    #trait_name_str,
                    ::std::vec![#(#method_descriptors),*],
                )
            }

            fn dispatch_table() -> #internal::DispatchTable<Self> {
                let mut table = #internal::DispatchTable::new();
                #(#handlers)*
                table
            }
        }
    }
}

fn code_for_stub(remote_trait: &RemoteTrait) -> TokenStream {
    let internal = internal_path();
    let trait_name = &remote_trait.name;

    let methods = remote_trait.methods.iter().map(|method| {
        let method_ident = &method.name;
        let method_name = method.name.to_string();
        let param_types = method.param_type_names();
        let arg_idents = arg_idents(method);
        let arg_types = &method.params;
        let output = &method.output;
        let invoke = if method.is_void() {
            quote! { invoke_void }
        } else {
            quote! { invoke }
        };
        quote! {
            async fn #method_ident(&self, #(#arg_idents: #arg_types),*) #output {
                self.#invoke(#method_name, &[#(#param_types),*], (#(#arg_idents,)*)).await
            }
        }
    });

    quote! {
        #[#internal::async_trait]
        impl #trait_name for #internal::Stub<dyn #trait_name> {
            #(#methods)*
        }
    }
}

fn arg_idents(method: &RemoteMethod) -> Vec<Ident> {
    (0..method.params.len())
        .map(|i| format_ident!("arg{}", i))
        .collect()
}
