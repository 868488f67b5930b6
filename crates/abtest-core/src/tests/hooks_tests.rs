use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use crate::memory::Mutation;
use crate::*;

thread_local! {
    static RENDERS: Cell<usize> = const { Cell::new(0) };
    static EFFECT_RUNS: Cell<usize> = const { Cell::new(0) };
}

fn bump(counter: &'static std::thread::LocalKey<Cell<usize>>) {
    counter.with(|count| count.set(count.get() + 1));
}

fn read(counter: &'static std::thread::LocalKey<Cell<usize>>) -> usize {
    counter.with(Cell::get)
}

fn renderer() -> Renderer<MemoryDocument> {
    Renderer::new(MemoryDocument::new())
}

fn mount(r: &mut Renderer<MemoryDocument>, component: Component, props: Props) -> MountHandle {
    let body = r.host().body();
    r.append(create_element(component, props, vec![]), body, false)
        .expect("mount")
}

fn counter(_: &Props) -> Child {
    bump(&RENDERS);
    let (count, set_count) = use_state(|| 0i64);
    create_element(
        "button",
        Props::new().on("click", move |_| set_count.update(|count| count + 1)),
        children![count],
    )
    .into()
}

#[test]
fn click_updates_text_without_replacing_nodes() {
    let mut r = renderer();
    let handle = mount(&mut r, Component::new(counter), Props::new());
    let button = handle.node().unwrap();
    let label = r.host().children(button)[0];
    assert_eq!(r.host().text_content(button), "0");
    r.host_mut().clear_mutations();

    assert_eq!(r.host().dispatch_event(button, "click"), 1);
    assert!(r.should_tick());
    r.run_until_idle().unwrap();

    assert_eq!(r.host().text_content(button), "1");
    assert_eq!(r.root_nodes(handle.root()), vec![button]);
    assert_eq!(r.host().children(button), vec![label]);
    assert_eq!(r.host().mutations(), &[Mutation::SetText { id: label }]);
}

#[test]
fn updates_within_one_turn_coalesce() {
    let mut r = renderer();
    let handle = mount(&mut r, Component::new(counter), Props::new());
    let button = handle.node().unwrap();
    let before = read(&RENDERS);

    r.host().dispatch_event(button, "click");
    r.host().dispatch_event(button, "click");
    r.host().dispatch_event(button, "click");
    r.run_until_idle().unwrap();

    assert_eq!(read(&RENDERS) - before, 1);
    assert_eq!(r.host().text_content(button), "3");
}

fn static_label(props: &Props) -> Child {
    bump(&RENDERS);
    let (value, set_value) = use_state(|| props.get_str("label").unwrap_or("").to_string());
    let setter = set_value.clone();
    create_element(
        "span",
        Props::new().on("click", move |_| setter.set(value.clone())),
        children![set_value.get()],
    )
    .into()
}

#[test]
fn setting_an_equal_value_schedules_nothing() {
    let mut r = renderer();
    let handle = mount(
        &mut r,
        Component::new(static_label),
        Props::new().attr("label", "same"),
    );
    r.run_until_idle().unwrap();
    let before = read(&RENDERS);

    r.host().dispatch_event(handle.node().unwrap(), "click");

    assert!(!r.should_tick());
    r.run_until_idle().unwrap();
    assert_eq!(read(&RENDERS), before);
}

fn tracked(props: &Props) -> Child {
    let (_, _set) = use_state(|| 0);
    let label = props.get_str("label").unwrap_or("").to_string();
    use_effect_with(label.clone(), |_| {
        bump(&EFFECT_RUNS);
        EffectResult::default()
    });
    create_element("p", Props::new(), children![label]).into()
}

#[test]
fn effect_reruns_only_when_dependencies_change() {
    let mut r = renderer();
    let body = r.host().body();
    let tree = |label: &str| {
        create_element(
            Component::new(tracked),
            Props::new().attr("label", label),
            vec![],
        )
    };
    let handle = r.append(tree("a"), body, false).unwrap();
    r.run_until_idle().unwrap();
    let start = read(&EFFECT_RUNS);

    for _ in 0..3 {
        r.update(&handle, tree("a")).unwrap();
        r.run_until_idle().unwrap();
    }
    assert_eq!(read(&EFFECT_RUNS), start);

    r.update(&handle, tree("b")).unwrap();
    r.run_until_idle().unwrap();
    assert_eq!(read(&EFFECT_RUNS), start + 1);
}

#[test]
fn effect_without_dependencies_runs_after_every_commit() {
    let runs = Rc::new(Cell::new(0));
    let seen = Rc::clone(&runs);
    let component = move || {
        let seen = Rc::clone(&seen);
        Component::new(move |_: &Props| {
            let seen = Rc::clone(&seen);
            use_effect(move |_| {
                seen.set(seen.get() + 1);
                EffectResult::default()
            });
            Child::Empty
        })
    };
    let mut r = renderer();
    let body = r.host().body();
    let handle = r
        .append(create_element(component(), Props::new(), vec![]), body, false)
        .unwrap();
    r.run_until_idle().unwrap();
    r.update(&handle, create_element(component(), Props::new(), vec![]))
        .unwrap();
    r.run_until_idle().unwrap();
    assert_eq!(runs.get(), 2);
}

#[test]
fn effects_are_deferred_to_the_next_tick() {
    let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));
    let sink = Rc::clone(&log);
    let component = Component::new(move |_: &Props| {
        sink.borrow_mut().push("render");
        let sink = Rc::clone(&sink);
        use_effect_with((), move |_| {
            sink.borrow_mut().push("effect");
            EffectResult::default()
        });
        Child::Empty
    });
    let mut r = renderer();
    mount(&mut r, component, Props::new());
    assert_eq!(*log.borrow(), vec!["render"]);

    r.tick().unwrap();
    assert_eq!(*log.borrow(), vec!["render", "effect"]);
    assert!(!r.should_tick());
}

#[test]
fn changed_dependencies_run_cleanup_at_commit() {
    let log = Rc::new(RefCell::new(Vec::<String>::new()));
    let sink = Rc::clone(&log);
    let component = move || {
        let sink = Rc::clone(&sink);
        Component::new(move |props: &Props| {
            let value = props.get_int("value").unwrap_or_default();
            let sink = Rc::clone(&sink);
            use_effect_with(value, move |scope| {
                sink.borrow_mut().push(format!("run {value}"));
                scope.on_cleanup(move || sink.borrow_mut().push(format!("cleanup {value}")))
            });
            Child::Empty
        })
    };
    let mut r = renderer();
    let body = r.host().body();
    let tree = |value: i64| create_element(component(), Props::new().attr("value", value), vec![]);
    let handle = r.append(tree(1), body, false).unwrap();
    r.run_until_idle().unwrap();

    r.update(&handle, tree(2)).unwrap();
    assert_eq!(*log.borrow(), vec!["run 1", "cleanup 1"]);
    r.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["run 1", "cleanup 1", "run 2"]);

    r.unmount(&handle).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["run 1", "cleanup 1", "run 2", "cleanup 2"]
    );
}

#[test]
fn cleanup_runs_before_nodes_are_detached() {
    let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));
    let mut document = MemoryDocument::new();
    let detached = Rc::clone(&log);
    document.observe(move |mutation| {
        if matches!(mutation, Mutation::Remove { .. }) {
            detached.borrow_mut().push("detach");
        }
    });
    let sink = Rc::clone(&log);
    let component = Component::new(move |_: &Props| {
        let sink = Rc::clone(&sink);
        use_effect_with((), move |scope| {
            scope.on_cleanup(move || sink.borrow_mut().push("cleanup"))
        });
        create_element("div", Props::new(), children!["widget"]).into()
    });
    let mut r = Renderer::new(document);
    let handle = mount(&mut r, component, Props::new());
    r.run_until_idle().unwrap();

    r.unmount(&handle).unwrap();

    assert_eq!(*log.borrow(), vec!["cleanup", "detach"]);
}

#[test]
fn effect_pending_at_unmount_is_dropped() {
    let runs = Rc::new(Cell::new(0));
    let seen = Rc::clone(&runs);
    let component = Component::new(move |_: &Props| {
        let seen = Rc::clone(&seen);
        use_effect(move |_| {
            seen.set(seen.get() + 1);
            EffectResult::default()
        });
        Child::Empty
    });
    let mut r = renderer();
    let handle = mount(&mut r, component, Props::new());
    r.unmount(&handle).unwrap();
    r.run_until_idle().unwrap();
    assert_eq!(runs.get(), 0);
}

fn loader(_: &Props) -> Child {
    let (ready, set_ready) = use_state(|| false);
    use_effect_with((), move |_| {
        set_ready.set(true);
        EffectResult::default()
    });
    create_element("p", Props::new(), children![if ready { "ready" } else { "loading" }]).into()
}

#[test]
fn state_set_from_an_effect_rerenders() {
    let mut r = renderer();
    let handle = mount(&mut r, Component::new(loader), Props::new());
    let p = handle.node().unwrap();
    assert_eq!(r.host().text_content(p), "loading");
    r.run_until_idle().unwrap();
    assert_eq!(r.host().text_content(p), "ready");
}

fn runaway(_: &Props) -> Child {
    let (count, set_count) = use_state(|| 0u32);
    set_count.set(count + 1);
    Child::from(count.to_string())
}

#[test]
fn endless_updates_hit_the_tick_limit() {
    let config = RendererConfig {
        tick_limit: 5,
        ..RendererConfig::default()
    };
    let mut r = Renderer::with_config(
        MemoryDocument::new(),
        Runtime::new(Arc::new(DefaultScheduler)),
        config,
    );
    mount(&mut r, Component::new(runaway), Props::new());
    assert_eq!(
        r.run_until_idle().unwrap_err(),
        RenderError::TickLimit { limit: 5 }
    );
}

fn keyed_counter(props: &Props) -> Child {
    let start = props.get_int("start").unwrap_or_default();
    let (count, set_count) = use_state(|| start);
    create_element(
        "li",
        Props::new().on("click", move |_| set_count.set(count + 10)),
        children![count],
    )
    .into()
}

#[test]
fn keyed_components_keep_their_state_when_reordered() {
    let mut r = renderer();
    let body = r.host().body();
    let tree = |order: &[i64]| {
        let items: Vec<Child> = order
            .iter()
            .map(|&start| {
                create_element(
                    Component::new(keyed_counter),
                    Props::new().key(start).attr("start", start),
                    vec![],
                )
                .into()
            })
            .collect();
        create_element("ul", Props::new(), items)
    };
    let handle = r.append(tree(&[1, 2]), body, false).unwrap();
    let ul = handle.node().unwrap();
    let first = r.host().children(ul)[0];
    r.host().dispatch_event(first, "click");
    r.run_until_idle().unwrap();
    assert_eq!(r.host().text_content(ul), "112");

    r.update(&handle, tree(&[2, 1])).unwrap();
    assert_eq!(r.host().text_content(ul), "211");
    assert_eq!(r.host().children(ul)[1], first);
}

type Probe = Rc<RefCell<Vec<(Ref<usize>, NodeRef)>>>;

fn measured(props: &Props) -> Child {
    let renders = use_ref(|| 0usize);
    renders.update(|count| *count += 1);
    let target: NodeRef = use_ref(|| None);
    if let Some(probe) = props.get_data::<Probe>("probe") {
        probe.borrow_mut().push((renders.clone(), target.clone()));
    }
    let (tick, set_tick) = use_state(|| 0);
    create_element(
        "div",
        Props::new()
            .node_ref(&target)
            .on("click", move |_| set_tick.set(tick + 1)),
        vec![],
    )
    .into()
}

#[test]
fn refs_keep_identity_across_renders() {
    let probe: Probe = Rc::default();
    let mut r = renderer();
    let handle = mount(
        &mut r,
        Component::new(measured),
        Props::new().data("probe", Rc::clone(&probe)),
    );
    let div = handle.node().unwrap();
    r.host().dispatch_event(div, "click");
    r.run_until_idle().unwrap();
    r.host().dispatch_event(div, "click");
    r.run_until_idle().unwrap();

    let seen = probe.borrow();
    assert_eq!(seen.len(), 3);
    for (renders, target) in seen.iter() {
        assert!(renders.ptr_eq(&seen[0].0));
        assert!(target.ptr_eq(&seen[0].1));
    }
    assert_eq!(seen[0].0.current(), 3);
    assert_eq!(seen[0].1.current(), Some(div));
}

#[test]
#[should_panic(expected = "hook called outside of a component render")]
fn hooks_outside_render_panic() {
    let _ = use_state(|| 0);
}

#[test]
fn scheduler_is_asked_for_a_tick_once_per_batch() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recording {
        requests: AtomicUsize,
    }

    impl RuntimeScheduler for Recording {
        fn schedule_tick(&self) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    let scheduler = Arc::new(Recording::default());
    let mut r = Renderer::with_scheduler(MemoryDocument::new(), scheduler.clone());
    let handle = mount(&mut r, Component::new(counter), Props::new());
    r.run_until_idle().unwrap();
    let baseline = scheduler.requests.load(Ordering::SeqCst);

    let button = handle.node().unwrap();
    r.host().dispatch_event(button, "click");
    r.host().dispatch_event(button, "click");
    assert_eq!(scheduler.requests.load(Ordering::SeqCst), baseline + 1);
}
