//! The demo service the operator patches: a toy HTTP handler exported to scripts as the
//! `handler` package.

use hf_core::{Error, Exports, NativeFunction, Result, SymbolTable, Ty, TypeDescriptor, Value};
use std::sync::Arc;
use tracing::debug;

pub const APP_SET: &str = "app";
pub const SVC_TYPE: &str = "handler::HttpSvc";
pub const REQUEST_TYPE: &str = "handler::Request";

pub struct HttpSvc;

impl HttpSvc {
    fn index(&self, req: &Request) -> String {
        format!("index page for {}", req.path)
    }

    fn hello(&self, req: &Request) -> String {
        format!("hello from {}", req.path)
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
        }
    }
}

/// One service instance, its type descriptors and the symbols scripts see.
pub struct DemoHost {
    svc_type: Arc<TypeDescriptor>,
    req_type: Arc<TypeDescriptor>,
    svc: Value,
    symbols: SymbolTable,
}

impl DemoHost {
    pub fn new() -> Result<Self> {
        let req_type = TypeDescriptor::builder::<Request>(REQUEST_TYPE)
            .field("method", |req| Value::from(req.method.as_str()))
            .field("path", |req| Value::from(req.path.as_str()))
            .build();
        let svc_type = TypeDescriptor::builder::<HttpSvc>(SVC_TYPE)
            .method("index", vec![Ty::named(REQUEST_TYPE)], Ty::Str, |svc, args| {
                let req = args.host::<Request>(0)?;
                Ok(Value::string(svc.index(&req)))
            })
            .method("hello", vec![Ty::named(REQUEST_TYPE)], Ty::Str, |svc, args| {
                let req = args.host::<Request>(0)?;
                Ok(Value::string(svc.hello(&req)))
            })
            .build();
        let svc = svc_type.instance(Arc::new(HttpSvc))?;

        let request = {
            let req_type = req_type.clone();
            NativeFunction::new("request", vec![Ty::Str], Ty::named(REQUEST_TYPE), move |args| {
                req_type.instance(Arc::new(Request::get(args.str(0)?)))
            })
        };
        let exports = Exports::new(APP_SET)
            .with_type(&svc_type)
            .with_type(&req_type)
            .with_function("handler", request);
        let symbols = SymbolTable::from_exports(&exports)?;
        Ok(Self {
            svc_type,
            req_type,
            svc,
            symbols,
        })
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn svc_type(&self) -> &Arc<TypeDescriptor> {
        &self.svc_type
    }

    /// Serve `path` with `HttpSvc::<method>`, going through the live entry like any
    /// other caller.
    pub fn call(&self, method: &str, path: &str) -> Result<String> {
        let req = self.request(path)?;
        debug!(method, path, "demo call");
        let out = self.svc_type.call(method, vec![self.svc.clone(), req])?;
        Ok(out.into_string())
    }

    /// Like [`DemoHost::call`], but bypassing any live patch.
    pub fn call_original(&self, method: &str, path: &str) -> Result<String> {
        let slot = self.svc_type.method(method).ok_or_else(|| Error::MethodNotFound {
            owner: self.svc_type.name().to_string(),
            method: method.to_string(),
            available: None,
        })?;
        let out = slot.call_original(vec![self.svc.clone(), self.request(path)?])?;
        Ok(out.into_string())
    }

    fn request(&self, path: &str) -> Result<Value> {
        self.req_type.instance(Arc::new(Request::get(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serves_both_routes() {
        let host = DemoHost::new().unwrap();
        assert_eq!(host.call("index", "/").unwrap(), "index page for /");
        assert_eq!(host.call("hello", "/docs").unwrap(), "hello from /docs");
        assert_eq!(host.svc_type().method_names(), vec!["hello", "index"]);
    }

    #[test]
    fn exports_the_handler_package() {
        let host = DemoHost::new().unwrap();
        let symbols = host.symbols();
        assert!(symbols.lookup("handler", "HttpSvc").is_some());
        assert!(symbols.lookup("handler", "Request").is_some());
        assert!(symbols.lookup("handler", "request").is_some());
        assert_eq!(symbols.sets(), [APP_SET]);
    }

    #[test]
    fn unknown_methods_fail() {
        let host = DemoHost::new().unwrap();
        let err = host.call("missing", "/").unwrap_err();
        assert_eq!(err.kind(), hf_core::ErrorKind::MethodNotFound);
        let err = host.call_original("missing", "/").unwrap_err();
        assert_eq!(err.kind(), hf_core::ErrorKind::MethodNotFound);
    }
}
