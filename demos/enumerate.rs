//! List all devices visible to the registry.

use visorhal::{Context, StringProp};

fn main() {
    env_logger::init();

    let ctx = Context::new();
    let count = ctx.probe();

    println!("Found {} device(s):", count);
    for i in 0..count {
        println!(
            "  [{}] {} / {} at {}",
            i,
            ctx.list_string(i, StringProp::Vendor).unwrap_or_default(),
            ctx.list_string(i, StringProp::Product).unwrap_or_default(),
            ctx.list_string(i, StringProp::Path).unwrap_or_default(),
        );
    }
}
