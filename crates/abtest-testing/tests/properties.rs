use std::cell::{Cell, RefCell};
use std::rc::Rc;

use abtest_core::{use_effect_with, use_state, EffectResult};
use abtest_testing::prelude::*;

fn counter(_: &Props) -> Child {
    let (count, set_count) = use_state(|| 0i64);
    create_element(
        "button",
        Props::new().on("click", move |_| set_count.set(count + 1)),
        children![count],
    )
    .into()
}

#[test]
fn counter_click_updates_text_in_place() {
    run_test_mount(|rule| {
        rule.set_content(create_element(Component::new(counter), Props::new(), vec![]))
            .expect("mount counter");
        let button = rule.root().expect("button");
        assert_eq!(rule.text_content(), "0");
        rule.clear_mutations();

        assert_eq!(rule.click(button).expect("click"), 1);

        assert_eq!(rule.text_content(), "1");
        assert_eq!(rule.root(), Some(button));
        assert_eq!(rule.created_elements(), 0);
        assert!(rule
            .document()
            .mutations()
            .iter()
            .all(|mutation| matches!(mutation, Mutation::SetText { .. })));
    });
}

fn keyed(keys: &[&str]) -> VNode {
    let items = keys
        .iter()
        .map(|&key| create_element("li", Props::new().key(key), children![key]).into())
        .collect();
    create_element("ul", Props::new(), items)
}

#[test]
fn keyed_remount_creates_only_the_new_item() {
    run_test_mount(|rule| {
        rule.set_content(keyed(&["a", "b"])).expect("first mount");
        let list = rule.root().expect("list");
        let before = rule.document().children(list);
        rule.clear_mutations();

        rule.set_content(keyed(&["b", "a", "c"])).expect("second mount");

        assert_eq!(rule.created_elements(), 1);
        let after = rule.document().children(list);
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[1]);
        assert_eq!(after[1], before[0]);
        assert_eq!(rule.text_content(), "bac");
    });
}

fn pair(_: &Props) -> Child {
    fragment(children![
        create_element("div", Props::new(), children!["one"]),
        create_element("div", Props::new(), children!["two"]),
    ])
    .into()
}

fn wrapper(_: &Props) -> Child {
    fragment(children![create_element(Component::new(pair), Props::new(), vec![])]).into()
}

#[test]
fn nested_fragments_commit_as_siblings() {
    run_test_mount(|rule| {
        rule.set_content(create_element(
            "section",
            Props::new(),
            children![create_element(Component::new(wrapper), Props::new(), vec![])],
        ))
        .expect("mount");
        let section = rule.root().expect("section");
        let document = rule.document();
        let children = document.children(section);

        assert_eq!(children.len(), 2);
        assert!(children
            .iter()
            .all(|&child| document.tag(child) == Some("div")));
        assert_eq!(document.text_content(section), "onetwo");
    });
}

thread_local! {
    static EFFECT_RUNS: Cell<usize> = const { Cell::new(0) };
}

fn tracked(props: &Props) -> Child {
    let (clicks, _) = use_state(|| 0u32);
    let label = props.get_str("label").unwrap_or_default().to_string();
    use_effect_with(label.clone(), |_| {
        EFFECT_RUNS.with(|runs| runs.set(runs.get() + 1));
        EffectResult::default()
    });
    create_element("span", Props::new(), children![label, clicks]).into()
}

fn tracked_with(label: &str, pass: i64) -> VNode {
    create_element(
        Component::new(tracked),
        Props::new().attr("label", label).attr("pass", pass),
        vec![],
    )
}

#[test]
fn effect_reruns_only_when_deps_change() {
    run_test_mount(|rule| {
        let start = EFFECT_RUNS.with(Cell::get);
        rule.set_content(tracked_with("a", 0)).expect("mount");
        rule.pump_until_idle().expect("settle");
        for pass in 1..=3 {
            rule.set_content(tracked_with("a", pass)).expect("rerender");
            rule.pump_until_idle().expect("settle");
        }
        assert_eq!(EFFECT_RUNS.with(Cell::get) - start, 1);

        rule.set_content(tracked_with("b", 4)).expect("rerender");
        rule.pump_until_idle().expect("settle");
        assert_eq!(EFFECT_RUNS.with(Cell::get) - start, 2);
    });
}

#[test]
fn conditional_removal_runs_cleanup_before_detach() {
    let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));
    let sink = Rc::clone(&log);
    let widget = Component::new(move |_: &Props| {
        let sink = Rc::clone(&sink);
        use_effect_with((), move |scope| {
            scope.on_cleanup(move || sink.borrow_mut().push("cleanup"))
        });
        create_element("em", Props::new(), children!["widget"]).into()
    });
    let panel = Component::new(move |_: &Props| {
        let (open, set_open) = use_state(|| true);
        create_element(
            "div",
            Props::new(),
            children![
                create_element(
                    "button",
                    Props::new().on("click", move |_| set_open.set(!open)),
                    children!["toggle"],
                ),
                open.then(|| create_element(widget.clone(), Props::new(), vec![])),
            ],
        )
        .into()
    });

    run_test_mount(|rule| {
        rule.set_content(create_element(panel, Props::new(), vec![]))
            .expect("mount");
        rule.pump_until_idle().expect("settle");
        let detached = Rc::clone(&log);
        rule.document_mut().observe(move |mutation| {
            if matches!(mutation, Mutation::Remove { .. }) {
                detached.borrow_mut().push("detach");
            }
        });

        let button = rule.find_by_tag("button")[0];
        rule.click(button).expect("toggle");

        assert_eq!(*log.borrow(), vec!["cleanup", "detach"]);
        assert!(rule.find_by_tag("em").is_empty());
    });
}

#[test]
fn remount_with_clear_replaces_previous_output() {
    run_test_mount(|rule| {
        let body = rule.body();
        rule.renderer()
            .append(keyed(&["x"]), body, true)
            .expect("first mount");
        rule.renderer()
            .append(keyed(&["y"]), body, true)
            .expect("second mount");

        assert_eq!(rule.renderer().root_count(), 1);
        assert_eq!(rule.find_by_tag("ul").len(), 1);
        assert_eq!(rule.text_content(), "y");
    });
}
