//! Argument parsing shared by every routing directive.
//!
//! A directive takes an optional leading string literal followed by
//! `key = value` pairs, for example `#[get("/{id}")]`,
//! `#[path_variable("id", default = -1)]` or
//! `#[validate(rules = ["name@Required"], failfast = true)]`.

use syn::{
    Attribute, Expr, ExprArray, ExprLit, Lit, LitStr, Meta, Token,
    parse::{Parse, ParseStream},
};

use crate::error::MetaError;

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl DirectiveValue {
    /// String form of a scalar value, used for defaults and names.
    pub fn as_text(&self) -> Option<String> {
        match self {
            DirectiveValue::Str(s) => Some(s.clone()),
            DirectiveValue::Int(n) => Some(n.to_string()),
            DirectiveValue::Float(f) => Some(f.to_string()),
            DirectiveValue::Bool(b) => Some(b.to_string()),
            DirectiveValue::List(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectiveArgs {
    pub positional: Option<String>,
    pub named: Vec<(String, DirectiveValue)>,
}

impl DirectiveArgs {
    pub fn get(&self, key: &str) -> Option<&DirectiveValue> {
        self.named
            .iter()
            .find_map(|(name, value)| (name == key).then_some(value))
    }

    /// Positional literal or the value of `key`, in that order.
    pub fn text(&self, key: &str) -> Option<String> {
        self.positional
            .clone()
            .or_else(|| self.get(key).and_then(DirectiveValue::as_text))
    }

    pub fn named_text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(DirectiveValue::as_text)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            DirectiveValue::Bool(b) => Some(*b),
            DirectiveValue::Str(s) => s.parse().ok(),
            DirectiveValue::Int(n) => Some(*n != 0),
            DirectiveValue::Float(_) => None,
            DirectiveValue::List(_) => None,
        }
    }

    /// Parses the arguments of an attribute; a bare `#[name]` has none.
    pub fn from_attribute(attr: &Attribute, directive: &str) -> Result<Self, MetaError> {
        match &attr.meta {
            Meta::Path(_) => Ok(Self::default()),
            Meta::List(list) if list.tokens.is_empty() => Ok(Self::default()),
            Meta::List(_) => attr
                .parse_args::<DirectiveArgs>()
                .map_err(|e| MetaError::malformed(directive, e)),
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Ok(Self {
                    positional: Some(s.value()),
                    named: Vec::new(),
                }),
                _ => Err(MetaError::malformed(directive, "expected a string literal")),
            },
        }
    }
}

impl Parse for DirectiveArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = DirectiveArgs::default();
        if input.peek(LitStr) {
            let lit: LitStr = input.parse()?;
            args.positional = Some(lit.value());
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        while !input.is_empty() {
            let name: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let value = parse_value(input)?;
            args.named.push((name.to_string(), value));
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(args)
    }
}

fn parse_value(input: ParseStream) -> syn::Result<DirectiveValue> {
    if input.peek(syn::token::Bracket) {
        let array: ExprArray = input.parse()?;
        let items = array
            .elems
            .iter()
            .map(|elem| match elem {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Ok(s.value()),
                other => Err(syn::Error::new_spanned(other, "expected a string literal")),
            })
            .collect::<syn::Result<Vec<_>>>()?;
        return Ok(DirectiveValue::List(items));
    }
    let negative = input.peek(Token![-]);
    if negative {
        input.parse::<Token![-]>()?;
    }
    let lit: Lit = input.parse()?;
    match lit {
        Lit::Int(n) => {
            let n: i64 = n.base10_parse()?;
            Ok(DirectiveValue::Int(if negative { -n } else { n }))
        }
        Lit::Float(f) => {
            let f: f64 = f.base10_parse()?;
            Ok(DirectiveValue::Float(if negative { -f } else { f }))
        }
        other if negative => Err(syn::Error::new_spanned(other, "only numbers can be negative")),
        Lit::Str(s) => Ok(DirectiveValue::Str(s.value())),
        Lit::Bool(b) => Ok(DirectiveValue::Bool(b.value)),
        other => Err(syn::Error::new_spanned(other, "unsupported literal")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_positional_and_named() {
        let attr: Attribute = parse_quote!(#[path_variable("id", default = "-1")]);
        let args = DirectiveArgs::from_attribute(&attr, "path_variable").unwrap();
        assert_eq!(args.positional.as_deref(), Some("id"));
        assert_eq!(args.named_text("default").as_deref(), Some("-1"));
    }

    #[test]
    fn test_negative_numbers() {
        let attr: Attribute = parse_quote!(#[request_param(default = -1, step = -0.5)]);
        let args = DirectiveArgs::from_attribute(&attr, "request_param").unwrap();
        assert_eq!(args.get("default"), Some(&DirectiveValue::Int(-1)));
        assert_eq!(args.named_text("default").as_deref(), Some("-1"));
        assert_eq!(args.get("step"), Some(&DirectiveValue::Float(-0.5)));
    }

    #[test]
    fn test_bare_attribute_has_no_args() {
        let attr: Attribute = parse_quote!(#[jwt_auth]);
        let args = DirectiveArgs::from_attribute(&attr, "jwt_auth").unwrap();
        assert_eq!(args, DirectiveArgs::default());
    }

    #[test]
    fn test_list_int_and_bool_values() {
        let attr: Attribute =
            parse_quote!(#[validate(rules = ["a@Required", "b@Int"], failfast = true)]);
        let args = DirectiveArgs::from_attribute(&attr, "validate").unwrap();
        assert_eq!(
            args.get("rules"),
            Some(&DirectiveValue::List(vec!["a@Required".into(), "b@Int".into()]))
        );
        assert_eq!(args.flag("failfast"), Some(true));

        let attr: Attribute = parse_quote!(#[rate_limit(total = 10, duration = "1m")]);
        let args = DirectiveArgs::from_attribute(&attr, "rate_limit").unwrap();
        assert_eq!(args.get("total"), Some(&DirectiveValue::Int(10)));
    }

    #[test]
    fn test_malformed_arguments() {
        let attr: Attribute = parse_quote!(#[get(1.5)]);
        assert!(matches!(
            DirectiveArgs::from_attribute(&attr, "get"),
            Err(MetaError::MalformedDirective { .. })
        ));
    }
}
