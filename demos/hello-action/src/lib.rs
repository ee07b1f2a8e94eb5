//! Sample action for the whisk action proxy
//!
//! Build with `cargo build --release`, zip `libhello_action.so` and
//! initialize the proxy with `main` set to one of:
//! - `hello_action::Greeter::Hello`
//! - `hello_action::Greeter::HelloLater`
//! - `hello_action::Greeter::Activation`
//!
//! ```text
//! curl -X POST http://localhost:8080/run \
//!   -H "Content-Type: application/json" \
//!   -d '{"value": {"name": "whisk"}, "activationId": "a1"}'
//! ```

use whisk_sdk::prelude::*;

#[derive(Debug, Deserialize)]
struct Greeting {
    name: Option<String>,
    place: Option<String>,
}

#[derive(Default)]
struct Greeter;

impl Greeter {
    fn hello(&mut self, args: ActionArgs) -> ActionResult {
        let greeting: Greeting = args.json()?;
        Ok(Some(json!({
            "greeting": format!(
                "Hello {} from {}!",
                greeting.name.as_deref().unwrap_or("stranger"),
                greeting.place.as_deref().unwrap_or("somewhere")
            )
        })))
    }

    async fn hello_later(&mut self, args: ActionArgs) -> ActionResult {
        self.hello(args)
    }

    /// Echo the activation metadata the proxy exposed for this call
    fn activation(&mut self, args: ActionArgs) -> ActionResult {
        let env: serde_json::Map<String, JsonValue> = args
            .env
            .iter()
            .map(|(key, value)| (key.to_string(), JsonValue::String(value.to_string())))
            .collect();
        let cwd = std::env::current_dir().map_err(|e| ActionError::failed(e.to_string()))?;
        Ok(Some(json!({ "env": env, "cwd": cwd.display().to_string() })))
    }
}

static MODULE: ActionModule = ActionModule {
    name: "hello_action",
    types: &[ActionType {
        name: "Greeter",
        constructor: Some(construct::<Greeter>),
        methods: &[
            blocking_method!("Hello", Object, Greeter, hello),
            awaitable_method!("HelloLater", Object, Greeter, hello_later),
            blocking_method!("Activation", Any, Greeter, activation),
        ],
    }],
};

export_module!(MODULE);
