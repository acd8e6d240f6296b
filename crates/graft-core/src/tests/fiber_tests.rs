use super::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

fn setup() -> (Reconciler<MemoryHost>, HostNodeId) {
    let mut host = MemoryHost::new();
    let root = host.create_root();
    (Reconciler::new(host), root)
}

fn counter(renders: Rc<Cell<usize>>) -> Component {
    Component::builder("Counter", move |scope| {
        renders.set(renders.get() + 1);
        let count = scope.state_value("count").as_i64().unwrap_or(0);
        element(
            "button",
            Props::new().on("click", Handler::method("increment")),
            count.to_string(),
        )
    })
    .state(|props| json!({ "count": props["start"].as_i64().unwrap_or(0) }))
    .method("increment", |cx, _| {
        let count = cx.state()?["count"].as_i64().unwrap_or(0);
        cx.set_state(json!({ "count": count + 1 }))
    })
    .build()
    .expect("component")
}

fn mounted_fiber(tree: &VNode) -> Fiber {
    tree.fiber().cloned().expect("mounted component")
}

#[test]
fn click_runs_component_method_and_patches_text() {
    let renders = Rc::new(Cell::new(0));
    let (mut reconciler, root) = setup();
    let mut tree = component(&counter(renders.clone()), Props::new().attr("start", 5), ());
    reconciler.mount(&mut tree, root).expect("mount");
    let button = tree.first_host_node().expect("button");
    let label = reconciler.host().children(button).expect("children")[0];
    reconciler.host_mut().clear_ops();

    reconciler
        .host_mut()
        .dispatch_event(button, "click", &Value::Null)
        .expect("click");

    assert_eq!(reconciler.host().text(label), Some("6"));
    assert_eq!(renders.get(), 2);
    assert_eq!(
        mounted_fiber(&tree).state(),
        json!({ "count": 6 })
    );
    assert!(reconciler
        .host()
        .ops()
        .iter()
        .all(|op| !matches!(op, HostOp::Remove { .. })));
}

#[test]
fn deep_equal_state_update_is_a_no_op() {
    let renders = Rc::new(Cell::new(0));
    let (mut reconciler, root) = setup();
    let mut tree = component(&counter(renders.clone()), Props::new(), ());
    reconciler.mount(&mut tree, root).expect("mount");
    reconciler.host_mut().clear_ops();
    let fiber = mounted_fiber(&tree);

    fiber
        .set_state(reconciler.host_mut(), json!({ "count": 0 }))
        .expect("set state");
    fiber
        .update_props(reconciler.host_mut(), json!({}))
        .expect("update props");

    assert_eq!(renders.get(), 1);
    assert!(reconciler.host().ops().is_empty());
}

#[test]
fn descendants_report_mounted_before_ancestors() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let leaf = {
        let mounted_log = Rc::clone(&log);
        let unmounted_log = Rc::clone(&log);
        Component::builder("Leaf", |scope| text(scope.prop("name").as_str().unwrap_or("")))
            .on_mounted(move |cx, _| {
                let name = cx.props()?["name"].as_str().unwrap_or("").to_string();
                mounted_log.borrow_mut().push(format!("mounted {name}"));
                Ok(())
            })
            .on_unmounted(move |cx, _| {
                let name = cx.props()?["name"].as_str().unwrap_or("").to_string();
                unmounted_log.borrow_mut().push(format!("unmounted {name}"));
                Ok(())
            })
            .build()
            .expect("leaf")
    };
    let parent = {
        let leaf = leaf.clone();
        let mounted_log = Rc::clone(&log);
        Component::builder("Parent", move |_| {
            element(
                "div",
                Props::new(),
                [
                    component(&leaf, Props::new().attr("name", "a"), ()),
                    component(&leaf, Props::new().attr("name", "b"), ()),
                ],
            )
        })
        .on_mounted(move |_, _| {
            mounted_log.borrow_mut().push("mounted parent".to_string());
            Ok(())
        })
        .build()
        .expect("parent")
    };

    let (mut reconciler, root) = setup();
    let mut tree = component(&parent, Props::new(), ());
    reconciler.mount(&mut tree, root).expect("mount");
    assert!(log.borrow().is_empty());
    assert!(reconciler.scheduler().has_pending_jobs());

    assert_eq!(reconciler.flush(), 3);
    assert_eq!(
        *log.borrow(),
        vec!["mounted a", "mounted b", "mounted parent"]
    );

    log.borrow_mut().clear();
    reconciler.destroy(&mut tree).expect("destroy");
    reconciler.flush();
    assert_eq!(*log.borrow(), vec!["unmounted a", "unmounted b"]);
    assert!(reconciler.host().children(root).expect("children").is_empty());
}

fn todo_list() -> Component {
    let item = Component::builder("Item", |scope| {
        let id = scope.prop("id").clone();
        element(
            "li",
            Props::new(),
            [
                text(id.as_str().unwrap_or("")),
                element(
                    "button",
                    Props::new().on(
                        "click",
                        Handler::new(|cx, _| {
                            let id = cx.props()?["id"].clone();
                            cx.emit("remove", &json!({ "id": id }))
                        }),
                    ),
                    (),
                ),
            ],
        )
    })
    .build()
    .expect("item");

    Component::builder("List", move |scope| {
        let items = scope
            .state_value("items")
            .as_array()
            .cloned()
            .unwrap_or_default();
        element(
            "ul",
            Props::new(),
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|id| {
                    component(
                        &item,
                        Props::new()
                            .key(id)
                            .attr("id", id)
                            .on("remove", Handler::method("remove_item")),
                        (),
                    )
                })
                .collect::<Vec<_>>(),
        )
    })
    .state(|props| json!({ "items": props["items"].clone() }))
    .method("remove_item", |cx, payload| {
        let removed = payload["id"].clone();
        let items: Vec<Value> = cx.state()?["items"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|item| *item != removed)
            .collect();
        cx.set_state(json!({ "items": items }))
    })
    .build()
    .expect("list")
}

#[test]
fn child_emit_reaches_parent_method() {
    let (mut reconciler, root) = setup();
    let mut tree = component(
        &todo_list(),
        Props::new().attr("items", json!(["a", "b", "c"])),
        (),
    );
    reconciler.mount(&mut tree, root).expect("mount");
    let ul = tree.first_host_node().expect("ul");
    let items = reconciler.host().children(ul).expect("children");
    let b_button = reconciler.host().children(items[1]).expect("children")[1];

    reconciler
        .host_mut()
        .dispatch_event(b_button, "click", &Value::Null)
        .expect("click");

    assert_eq!(reconciler.host().text_content(ul), "ac");
    assert_eq!(
        reconciler.host().children(ul).expect("children"),
        vec![items[0], items[2]]
    );
    assert!(!reconciler.host().contains(b_button));
    assert_eq!(
        mounted_fiber(&tree).state(),
        json!({ "items": ["a", "c"] })
    );
}

#[test]
fn emit_without_subscriber_is_ignored() {
    let (mut reconciler, root) = setup();
    let quiet = Component::builder("Quiet", |_| fragment(())).build().expect("quiet");
    let mut tree = component(&quiet, Props::new(), ());
    reconciler.mount(&mut tree, root).expect("mount");

    let fiber = mounted_fiber(&tree);
    fiber
        .emit(reconciler.host_mut(), "nobody", &Value::Null)
        .expect("unhandled emit");
}

fn text_run(items: Value) -> Component {
    Component::builder("TextRun", |scope| {
        fragment(
            scope
                .state_value("items")
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(text)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
        )
    })
    .state(move |_| json!({ "items": items.clone() }))
    .build()
    .expect("text run")
}

#[test]
fn fragment_root_patches_between_foreign_siblings() {
    let (mut reconciler, root) = setup();
    let mut tree = element(
        "div",
        Props::new(),
        [
            text("<"),
            component(&text_run(json!(["x", "y"])), Props::new(), ()),
            text(">"),
        ],
    );
    reconciler.mount(&mut tree, root).expect("mount");
    let div = tree.host_node().expect("div");
    let fiber = tree.children()[1].fiber().cloned().expect("pair");
    assert_eq!(fiber.offset(reconciler.host()), Ok(1));

    fiber
        .set_state(reconciler.host_mut(), json!({ "items": ["y", "z", "x"] }))
        .expect("reorder");
    assert_eq!(reconciler.host().text_content(div), "<yzx>");
    assert_eq!(fiber.host_nodes().len(), 3);

    fiber
        .set_state(reconciler.host_mut(), json!({ "items": ["x"] }))
        .expect("shrink");
    assert_eq!(reconciler.host().text_content(div), "<x>");
    assert_eq!(tree.host_nodes(), vec![div]);
}

#[test]
fn empty_fragment_roots_refill_their_own_slot() {
    let (mut reconciler, root) = setup();
    let mut tree = element(
        "div",
        Props::new(),
        [
            text("<"),
            component(&text_run(json!([])), Props::new(), ()),
            component(&text_run(json!([])), Props::new(), ()),
            text(">"),
        ],
    );
    reconciler.mount(&mut tree, root).expect("mount");
    let div = tree.host_node().expect("div");
    let first = tree.children()[1].fiber().cloned().expect("first run");
    let second = tree.children()[2].fiber().cloned().expect("second run");
    assert_eq!(first.offset(reconciler.host()), Ok(1));
    assert_eq!(second.offset(reconciler.host()), Ok(1));

    second
        .set_state(reconciler.host_mut(), json!({ "items": ["b"] }))
        .expect("fill second");
    assert_eq!(reconciler.host().text_content(div), "<b>");

    first
        .set_state(reconciler.host_mut(), json!({ "items": ["a"] }))
        .expect("fill first");
    assert_eq!(reconciler.host().text_content(div), "<ab>");
    assert_eq!(second.offset(reconciler.host()), Ok(2));

    first
        .set_state(reconciler.host_mut(), json!({ "items": [] }))
        .expect("empty first");
    second
        .set_state(reconciler.host_mut(), json!({ "items": ["c", "b"] }))
        .expect("grow second");
    assert_eq!(reconciler.host().text_content(div), "<cb>");
}

#[test]
fn slot_children_and_props_flow_into_patches() {
    let renders = Rc::new(Cell::new(0));
    let card = {
        let renders = Rc::clone(&renders);
        Component::builder("Card", move |scope| {
            renders.set(renders.get() + 1);
            let title = scope.prop("title").as_str().unwrap_or("").to_string();
            element(
                "section",
                Props::new().attr("title", title),
                scope.children(),
            )
        })
        .build()
        .expect("card")
    };
    let (mut reconciler, root) = setup();
    let mut tree = component(&card, Props::new().attr("title", "one"), ["body"]);
    reconciler.mount(&mut tree, root).expect("mount");

    let tree = reconciler
        .patch(
            tree,
            component(&card, Props::new().attr("title", "one"), ["body"]),
            root,
        )
        .expect("same input");
    assert_eq!(renders.get(), 1);

    let tree = reconciler
        .patch(
            tree,
            component(&card, Props::new().attr("title", "two"), ["other"]),
            root,
        )
        .expect("changed input");
    assert_eq!(renders.get(), 2);
    let section = tree.first_host_node().expect("section");
    let dump = reconciler.host().dump_tree(root);
    assert_eq!(dump, "<root>\n  <section title=\"two\">\n    \"other\"\n");
    assert_eq!(mounted_fiber(&tree).first_host_node(), Some(section));
}

#[test]
fn different_components_remount() {
    let first = Component::builder("First", |_| text("first")).build().expect("first");
    let second = Component::builder("Second", |_| text("second")).build().expect("second");
    let (mut reconciler, root) = setup();
    let mut tree = component(&first, Props::new(), ());
    reconciler.mount(&mut tree, root).expect("mount");
    let old_fiber = mounted_fiber(&tree);

    let tree = reconciler
        .patch(tree, component(&second, Props::new(), ()), root)
        .expect("patch");

    assert!(!old_fiber.is_mounted());
    assert!(!mounted_fiber(&tree).ptr_eq(&old_fiber));
    assert_eq!(reconciler.host().text_content(root), "second");
}

#[test]
fn usage_errors_are_reported() {
    let renders = Rc::new(Cell::new(0));
    let (mut reconciler, root) = setup();
    let mut tree = component(&counter(renders), Props::new(), ());
    reconciler.mount(&mut tree, root).expect("mount");
    let fiber = mounted_fiber(&tree);

    assert_eq!(
        fiber.mount(reconciler.host_mut(), root, None),
        Err(ReconcileError::AlreadyMounted {
            component: "Counter"
        })
    );
    assert_eq!(
        fiber.set_state(reconciler.host_mut(), json!(3)),
        Err(ReconcileError::NotAnObject {
            component: "Counter",
            field: "state"
        })
    );
    assert_eq!(
        fiber.call(reconciler.host_mut(), "missing", &Value::Null),
        Err(ReconcileError::UnknownMethod {
            component: "Counter",
            method: "missing".to_string()
        })
    );

    reconciler.destroy(&mut tree).expect("destroy");
    assert_eq!(
        fiber.unmount(reconciler.host_mut()),
        Err(ReconcileError::NotMounted {
            component: "Counter"
        })
    );
    assert_eq!(
        fiber.set_state(reconciler.host_mut(), json!({ "count": 1 })),
        Err(ReconcileError::NotMounted {
            component: "Counter"
        })
    );
}

#[test]
fn duplicate_methods_are_rejected() {
    let result = Component::builder("Twice", |_| fragment(()))
        .method("go", |_, _| Ok(()))
        .method("go", |_, _| Ok(()))
        .build();
    assert_eq!(
        result.err(),
        Some(ReconcileError::DuplicateMethod {
            component: "Twice",
            method: "go"
        })
    );
}

#[test]
fn failing_lifecycle_hook_does_not_block_siblings() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let failing = Component::builder("Failing", |_| text("f"))
        .on_mounted(|cx, _| cx.call("missing", &Value::Null))
        .build()
        .expect("failing");
    let fine = {
        let log = Rc::clone(&log);
        Component::builder("Fine", |_| text("ok"))
            .on_mounted(move |_, _| {
                log.borrow_mut().push("fine".to_string());
                Ok(())
            })
            .build()
            .expect("fine")
    };
    let (mut reconciler, root) = setup();
    let mut tree = fragment(vec![
        component(&failing, Props::new(), ()),
        component(&fine, Props::new(), ()),
    ]);
    reconciler.mount(&mut tree, root).expect("mount");

    assert_eq!(reconciler.flush(), 2);
    assert_eq!(*log.borrow(), vec!["fine"]);
    assert_eq!(reconciler.host().text_content(root), "fok");
}
