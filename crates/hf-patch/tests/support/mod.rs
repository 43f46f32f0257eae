//! A tiny HTTP-like host used by the integration tests.
#![allow(dead_code)]

use hf_core::{Exports, NativeFunction, SymbolTable, Ty, TypeDescriptor, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub struct HttpSvc;

pub struct Request {
    pub path: String,
}

pub struct Host {
    pub svc_type: Arc<TypeDescriptor>,
    pub req_type: Arc<TypeDescriptor>,
    pub svc: Value,
    pub symbols: SymbolTable,
}

impl Host {
    /// Every call builds new descriptors, so tests never share method slots.
    pub fn new() -> Self {
        Self::with_exports(|exports| exports)
    }

    pub fn with_exports(extra: impl FnOnce(Exports) -> Exports) -> Self {
        let req_type = TypeDescriptor::builder::<Request>("handler::Request")
            .field("path", |req| Value::from(req.path.as_str()))
            .build();
        let svc_type = TypeDescriptor::builder::<HttpSvc>("handler::HttpSvc")
            .method("index", vec![Ty::named("handler::Request")], Ty::Str, |_, args| {
                let req = args.host::<Request>(0)?;
                Ok(Value::string(format!("index {}", req.path)))
            })
            .method("hello", vec![Ty::named("handler::Request")], Ty::Str, |_, args| {
                let req = args.host::<Request>(0)?;
                Ok(Value::string(format!("hello {}", req.path)))
            })
            .build();
        let svc = svc_type.instance(Arc::new(HttpSvc)).unwrap();

        let request_ctor = {
            let req_type = req_type.clone();
            NativeFunction::new("request", vec![Ty::Str], Ty::named("handler::Request"), move |args| {
                req_type.instance(Arc::new(Request {
                    path: args.str(0)?.to_string(),
                }))
            })
        };
        let exports = Exports::new("app")
            .with_type(&svc_type)
            .with_type(&req_type)
            .with_function("handler", request_ctor);
        let symbols = SymbolTable::from_exports(&extra(exports)).unwrap();
        Self {
            svc_type,
            req_type,
            svc,
            symbols,
        }
    }

    pub fn request(&self, path: &str) -> Value {
        self.req_type
            .instance(Arc::new(Request {
                path: path.to_string(),
            }))
            .unwrap()
    }

    /// Call `HttpSvc::<method>` the way the host does, through its slot.
    pub fn call(&self, method: &str, path: &str) -> String {
        let out = self
            .svc_type
            .call(method, vec![self.svc.clone(), self.request(path)])
            .unwrap();
        out.into_string()
    }
}

pub struct Scripts {
    dir: tempfile::TempDir,
}

impl Scripts {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn write(&self, name: &str, source: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(source.as_bytes()).unwrap();
        path
    }
}

pub const HELLO_WORLD: &str = r#"
use handler::{HttpSvc, Request};
use hotfix::FuncPatch;

fn index(_svc: &HttpSvc, _req: Request) -> String {
    "hello world".to_string()
}

pub fn patch_test_handler() -> FuncPatch {
    println!("[Patch] invoke patch_test_handler()");
    FuncPatch {
        target: HttpSvc,
        method: "index".to_string(),
        replacement: index,
    }
}
"#;

pub const RECOVERY: &str = r#"
use handler::{HttpSvc, Request};

pub fn patch_recovery_handler() -> hotfix::FuncPatch {
    let replacement = |svc: &HttpSvc, req: Request| -> String { svc.hello(req) };
    hotfix::FuncPatch {
        target: HttpSvc,
        method: "index".to_string(),
        replacement,
    }
}
"#;
