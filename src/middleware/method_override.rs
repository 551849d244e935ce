use tracing::debug;

use super::{Middleware, Next};
use crate::context::CancelToken;
use crate::http::{Method, Request, ResponseFuture};

/// Form field consulted for the tunnelled method.
const OVERRIDE_FIELD: &str = "_method";

/// Rewrites the method of `POST` requests from the `_method` form field.
///
/// HTML forms can only submit `GET` and `POST`; a form posting
/// `_method=delete` is routed as `DELETE`. The value is uppercased. Requests
/// with any other method, or without a non-empty field, are left alone.
///
/// Register it ahead of anything that inspects the method.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodOverride;

impl Middleware for MethodOverride {
    fn handle(&self, cx: CancelToken, mut request: Request, next: Next) -> ResponseFuture {
        if request.method() == &Method::Post {
            if let Some(method) = request
                .form_value(OVERRIDE_FIELD)
                .filter(|value| !value.is_empty())
            {
                let method = Method::from(method.to_ascii_uppercase().as_str());
                debug!(path = request.path(), method = %method, "method overridden");
                request.set_method(method);
            }
        }

        Box::pin(next.run(cx, request))
    }
}
