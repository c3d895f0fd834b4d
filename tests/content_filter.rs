//! Content filter tests: filtering at init, replacing and clearing at
//! runtime, and unsupported-transport behavior.

use courier::{
    ContentFilterOptions, MemoryTransport, Node, Subscription, SubscriptionError,
    SubscriptionOptions,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct BasicTypes {
    int32_value: i32,
    string_value: String,
}

impl courier::TopicMessage for BasicTypes {
    fn type_name() -> &'static str {
        "test_msgs/BasicTypes"
    }
}

fn message(n: i32) -> BasicTypes {
    BasicTypes {
        int32_value: n,
        string_value: format!("msg-{}", n),
    }
}

fn drain(subscription: &Subscription<BasicTypes>) -> Vec<i32> {
    let mut taken = Vec::new();
    let mut buffer = BasicTypes::default();
    while subscription.take(&mut buffer, None).is_ok() {
        taken.push(buffer.int32_value);
    }
    taken
}

#[test]
fn test_filter_at_init_narrows_delivery() {
    let transport = Arc::new(MemoryTransport::new());
    let node = Node::new("filtered", "/", transport.clone()).unwrap();

    let options = SubscriptionOptions::default()
        .with_content_filter(ContentFilterOptions::new("int32_value = %0", ["3"]));
    let mut subscription: Subscription<BasicTypes> = Subscription::new();
    subscription.init(&node, "numbers", options).unwrap();
    assert!(subscription.is_cft_enabled());

    let publisher = transport
        .create_publisher("/numbers", "test_msgs/BasicTypes")
        .unwrap();
    for n in 0..6 {
        transport.publish_message(publisher, &message(n)).unwrap();
    }

    assert_eq!(drain(&subscription), vec![3]);
}

#[test]
fn test_set_replace_and_clear_filter() {
    let transport = Arc::new(MemoryTransport::new());
    let node = Node::new("filtered", "/", transport.clone()).unwrap();

    let mut subscription: Subscription<BasicTypes> = Subscription::new();
    subscription
        .init(&node, "values", SubscriptionOptions::default())
        .unwrap();
    assert!(!subscription.is_cft_enabled());

    let publisher = transport
        .create_publisher("/values", "test_msgs/BasicTypes")
        .unwrap();

    // Unfiltered: everything arrives.
    for n in 0..3 {
        transport.publish_message(publisher, &message(n)).unwrap();
    }
    assert_eq!(drain(&subscription), vec![0, 1, 2]);

    // Filtered on a string field.
    let filter = ContentFilterOptions::new("string_value = 'msg-1'", Vec::<String>::new());
    subscription.set_content_filter(&filter).unwrap();
    assert!(subscription.is_cft_enabled());
    assert_eq!(subscription.get_content_filter().unwrap(), filter);

    for n in 0..3 {
        transport.publish_message(publisher, &message(n)).unwrap();
    }
    assert_eq!(drain(&subscription), vec![1]);

    // Replaced with a numeric filter.
    let filter = ContentFilterOptions::new("int32_value = %0", ["2"]);
    subscription.set_content_filter(&filter).unwrap();
    assert_eq!(subscription.get_content_filter().unwrap(), filter);

    for n in 0..3 {
        transport.publish_message(publisher, &message(n)).unwrap();
    }
    assert_eq!(drain(&subscription), vec![2]);

    // Cleared with the empty expression: everything arrives again.
    subscription
        .set_content_filter(&ContentFilterOptions::clearing())
        .unwrap();
    assert!(!subscription.is_cft_enabled());

    for n in 0..3 {
        transport.publish_message(publisher, &message(n)).unwrap();
    }
    assert_eq!(drain(&subscription), vec![0, 1, 2]);
}

#[test]
fn test_invalid_expression_rejected_and_state_kept() {
    let transport = Arc::new(MemoryTransport::new());
    let node = Node::new("filtered", "/", transport).unwrap();

    let mut subscription: Subscription<BasicTypes> = Subscription::new();
    subscription
        .init(&node, "values", SubscriptionOptions::default())
        .unwrap();

    let good = ContentFilterOptions::new("int32_value = 1", Vec::<String>::new());
    subscription.set_content_filter(&good).unwrap();

    let bad = ContentFilterOptions::new("no equals sign here", Vec::<String>::new());
    assert!(matches!(
        subscription.set_content_filter(&bad).unwrap_err(),
        SubscriptionError::Transport(_)
    ));
    // The previous filter survives a rejected replacement.
    assert!(subscription.is_cft_enabled());
    assert_eq!(subscription.get_content_filter().unwrap(), good);
}

#[test]
fn test_unsupported_transport_passthrough() {
    let transport = Arc::new(MemoryTransport::without_filter_support());
    let node = Node::new("plain", "/", transport).unwrap();

    let mut subscription: Subscription<BasicTypes> = Subscription::new();
    subscription
        .init(&node, "values", SubscriptionOptions::default())
        .unwrap();

    let filter = ContentFilterOptions::new("int32_value = 1", Vec::<String>::new());
    assert!(matches!(
        subscription.set_content_filter(&filter).unwrap_err(),
        SubscriptionError::Unsupported
    ));
    assert!(!subscription.is_cft_enabled());
    assert!(matches!(
        subscription.get_content_filter().unwrap_err(),
        SubscriptionError::Unsupported
    ));
}

#[test]
fn test_filter_at_init_on_unsupporting_transport_fails() {
    let transport = Arc::new(MemoryTransport::without_filter_support());
    let node = Node::new("plain", "/", transport).unwrap();

    let options = SubscriptionOptions::default().with_content_filter(ContentFilterOptions::new(
        "int32_value = 1",
        Vec::<String>::new(),
    ));
    let mut subscription: Subscription<BasicTypes> = Subscription::new();
    assert!(matches!(
        subscription.init(&node, "values", options).unwrap_err(),
        SubscriptionError::Unsupported
    ));
    assert!(!subscription.is_valid());
}

#[test]
fn test_get_filter_before_any_configuration() {
    let transport = Arc::new(MemoryTransport::new());
    let node = Node::new("plain", "/", transport).unwrap();

    let mut subscription: Subscription<BasicTypes> = Subscription::new();
    subscription
        .init(&node, "values", SubscriptionOptions::default())
        .unwrap();

    assert!(matches!(
        subscription.get_content_filter().unwrap_err(),
        SubscriptionError::Unsupported
    ));
    assert!(!subscription.is_cft_enabled());
}
