//! Event bus delivery through the model and registry paths.

use parking_lot::Mutex;
use recordb_core::{EventBus, Schema, DB_INIT_ERROR, MODEL_OP_ERROR};
use recordb_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn unsubscribed_listener_misses_model_errors() {
    with_memory_db(|context| {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let id = context
            .events()
            .on_model_operation_error(move |_| *counter.lock() += 1);

        let ghosts = context.model(Schema::new("ghosts"));
        assert!(ghosts.get("g1").is_err());
        assert!(context.events().unsubscribe(id));
        assert!(ghosts.get("g1").is_err());

        assert_eq!(*count.lock(), 1);
    });
}

#[test]
fn shared_bus_across_contexts() {
    let bus = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(MODEL_OP_ERROR, move |_| sink.lock().push("op"));
    let sink = Arc::clone(&seen);
    bus.subscribe(DB_INIT_ERROR, move |_| sink.lock().push("init"));

    with_memory_db(|context| {
        let context = context.clone().with_events(Arc::clone(&bus));
        let ghosts = context.model(Schema::new("ghosts"));
        assert!(ghosts.delete().is_err());
        let mut ghost = ghosts.new_instance();
        ghost.set_attribute("id", "g1");
        assert!(ghost.save().is_err());
    });

    assert_eq!(*seen.lock(), vec!["op"]);
}
