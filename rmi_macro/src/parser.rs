/*
Shape accepted for a remote interface:

    trait Name {
        async fn method(&self, arg: Type, ...) -> Result<Ok, Err>;
        ...
    }

- no generics on the trait or its methods, no associated types or consts
- every method is `async`, takes `&self`, and has no default body
- parameters are plain `name: Type` with owned types
- the return type is spelled `Result<Ok, Err>`; `Err` must implement
  `RemoteError`, which is checked by the compiler, not here
- method names must not shadow the stub's own methods
*/

use syn::{
    spanned::Spanned, Error, FnArg, GenericArgument, ItemTrait, Pat, PathArguments, Result,
    ReturnType, TraitItem, TraitItemMethod, Type,
};

use crate::interface::{RemoteMethod, RemoteTrait};

const RESERVED_NAMES: [&str; 4] = ["invoke", "invoke_void", "address", "descriptor"];

pub fn parse_remote_trait(item: &ItemTrait) -> Result<RemoteTrait> {
    if !item.generics.params.is_empty() || item.generics.where_clause.is_some() {
        return Err(Error::new(
            item.generics.span(),
            "remote interfaces cannot be generic",
        ));
    }

    let methods = item
        .items
        .iter()
        .map(|trait_item| match trait_item {
            TraitItem::Method(method) => parse_method(method),
            other => Err(Error::new(
                other.span(),
                "remote interfaces may only contain methods",
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RemoteTrait {
        name: item.ident.clone(),
        methods,
    })
}

fn parse_method(method: &TraitItemMethod) -> Result<RemoteMethod> {
    let sig = &method.sig;
    if RESERVED_NAMES.contains(&sig.ident.to_string().as_str()) {
        return Err(Error::new(
            sig.ident.span(),
            format!("the method name `{}` is reserved by Stub", sig.ident),
        ));
    }
    if sig.asyncness.is_none() {
        return Err(Error::new(sig.span(), "remote methods must be `async fn`"));
    }
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        return Err(Error::new(
            sig.generics.span(),
            "remote methods cannot be generic",
        ));
    }
    if let Some(default) = &method.default {
        return Err(Error::new(
            default.span(),
            "remote methods cannot have a default body",
        ));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(Error::new(
                sig.span(),
                "remote methods must take `&self` as their first parameter",
            ))
        }
    }

    let params = inputs
        .map(|input| match input {
            FnArg::Typed(pat_type) => {
                if !matches!(&*pat_type.pat, Pat::Ident(_)) {
                    return Err(Error::new(
                        pat_type.pat.span(),
                        "remote method parameters must be plain identifiers",
                    ));
                }
                if matches!(&*pat_type.ty, Type::Reference(_)) {
                    return Err(Error::new(
                        pat_type.ty.span(),
                        "remote method parameters must be owned types",
                    ));
                }
                Ok((*pat_type.ty).clone())
            }
            FnArg::Receiver(receiver) => {
                Err(Error::new(receiver.span(), "unexpected `self` parameter"))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let (ok_type, err_type) = parse_result_type(&sig.output)?;

    Ok(RemoteMethod {
        name: sig.ident.clone(),
        params,
        output: sig.output.clone(),
        ok_type,
        err_type,
    })
}

/// Splits `-> Result<Ok, Err>` into its two type arguments.
fn parse_result_type(output: &ReturnType) -> Result<(Type, Type)> {
    let error = || {
        Error::new(
            output.span(),
            "remote methods must return `Result<T, E>` where `E: RemoteError`",
        )
    };

    let ty = match output {
        ReturnType::Type(_, ty) => ty,
        ReturnType::Default => return Err(error()),
    };
    let segment = match &**ty {
        Type::Path(type_path) if type_path.qself.is_none() => type_path.path.segments.last(),
        _ => None,
    }
    .filter(|segment| segment.ident == "Result")
    .ok_or_else(error)?;

    let args = match &segment.arguments {
        PathArguments::AngleBracketed(args) => &args.args,
        _ => return Err(error()),
    };
    let mut types = args.iter().map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty.clone()),
        _ => None,
    });
    match (types.next(), types.next(), types.next()) {
        (Some(Some(ok_type)), Some(Some(err_type)), None) => Ok((ok_type, err_type)),
        _ => Err(error()),
    }
}
