// Replaces `HttpSvc::index` with a fixed greeting.
//
//     hotfix patches/patch_http.rs patch_test_handler()

use handler::{HttpSvc, Request};
use hotfix::FuncPatch;

fn index(_svc: &HttpSvc, _req: Request) -> String {
    "hello world".to_string()
}

pub fn patch_test_handler() -> FuncPatch {
    println!("[Patch] invoke patch_test_handler()");
    let patch = FuncPatch {
        target: HttpSvc,
        method: "index".to_string(),
        replacement: index,
    };
    println!("[Patch] invoke patch_test_handler() end");
    patch
}
