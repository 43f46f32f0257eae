// Routes `HttpSvc::index` to `HttpSvc::hello`.
//
//     hotfix patches/patch_recovery.rs patch_recovery_handler()

use handler::{HttpSvc, Request};
use hotfix::FuncPatch;

pub fn patch_recovery_handler() -> FuncPatch {
    println!("[Patch] invoke patch_recovery_handler()");
    let replacement = |svc: &HttpSvc, req: Request| -> String { svc.hello(req) };
    println!("[Patch] invoke patch_recovery_handler() end");
    FuncPatch {
        target: HttpSvc,
        method: "index".to_string(),
        replacement,
    }
}
