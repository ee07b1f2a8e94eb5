//! Test fixtures: an in-process action module and package builders

use std::io::{Cursor, Write};

use base64::Engine;
use serde_json::{json, Map, Value};
use whisk_sdk::prelude::*;
use zip::write::SimpleFileOptions;

use super::loader::{library_file_name, StaticLoader};

#[derive(Default)]
pub struct Echo {
    calls: u32,
}

impl Echo {
    fn main(&mut self, args: ActionArgs) -> ActionResult {
        Ok(Some(args.value.into_value()))
    }

    fn env(&mut self, args: ActionArgs) -> ActionResult {
        let vars: Map<String, Value> = args
            .env
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Ok(Some(Value::Object(vars)))
    }

    fn null(&mut self, _args: ActionArgs) -> ActionResult {
        Ok(None)
    }

    fn fail(&mut self, _args: ActionArgs) -> ActionResult {
        Err(ActionError::failed("division by zero"))
    }

    fn panic(&mut self, _args: ActionArgs) -> ActionResult {
        panic!("kaboom")
    }

    fn count(&mut self, _args: ActionArgs) -> ActionResult {
        self.calls += 1;
        Ok(Some(json!({ "calls": self.calls })))
    }

    async fn delayed(&mut self, args: ActionArgs) -> ActionResult {
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        let mut value = args.value.into_value();
        value["delayed"] = json!(true);
        Ok(Some(value))
    }

    async fn panic_later(&mut self, _args: ActionArgs) -> ActionResult {
        tokio::task::yield_now().await;
        panic!("kaboom later")
    }
}

pub static ECHO: ActionModule = ActionModule {
    name: "echo",
    types: &[ActionType {
        name: "Echo",
        constructor: Some(construct::<Echo>),
        methods: &[
            blocking_method!("Main", Object, Echo, main),
            blocking_method!("List", Array, Echo, list_alias),
            blocking_method!("Env", Any, Echo, env),
            blocking_method!("Null", Any, Echo, null),
            blocking_method!("Fail", Any, Echo, fail),
            blocking_method!("Panic", Any, Echo, panic),
            blocking_method!("Count", Any, Echo, count),
            awaitable_method!("Delayed", Object, Echo, delayed),
            awaitable_method!("PanicLater", Any, Echo, panic_later),
        ],
    }],
};

impl Echo {
    fn list_alias(&mut self, args: ActionArgs) -> ActionResult {
        self.main(args)
    }
}

pub fn echo_loader() -> StaticLoader {
    StaticLoader::new().with_module("echo", &ECHO)
}

/// A zip holding a placeholder library file for `module`
pub fn package(module: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(library_file_name(module), SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"\x7fELF placeholder").unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn encoded_package(module: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(package(module))
}

pub fn init_body(main: &str, package: &[u8]) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "value": {
            "main": main,
            "code": base64::engine::general_purpose::STANDARD.encode(package),
            "binary": true,
        }
    }))
    .unwrap()
}
