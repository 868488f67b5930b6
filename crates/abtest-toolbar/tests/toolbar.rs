use abtest_core::{Host, NodeId};
use abtest_testing::prelude::*;
use abtest_toolbar::{experiment_preview, Experiment, Variation};

fn checkout() -> Experiment {
    Experiment::new(
        "checkout-cta",
        vec![
            Variation::new("control", "Control", "<button>Buy</button>"),
            Variation::new("green", "Green", "<button class=\"green\">Buy now</button>"),
            Variation::new("banner", "Banner", "<div class=\"banner\">Free shipping</div>"),
        ],
    )
}

fn variation_button(rule: &MountTestRule, id: &str) -> NodeId {
    let document = rule.document();
    document
        .elements_by_tag(rule.body(), "button")
        .into_iter()
        .find(|&button| {
            document.attribute(button, "data-variation").ok().flatten().as_deref() == Some(id)
        })
        .expect("variation button")
}

fn content(rule: &MountTestRule) -> NodeId {
    rule.root_nodes()[0]
}

#[test]
fn preview_starts_on_the_first_variation() {
    run_test_mount(|rule| {
        rule.set_content(experiment_preview(checkout())).expect("mount");
        rule.pump_until_idle().expect("settle");

        assert_eq!(rule.root_nodes().len(), 2);
        let document = rule.document();
        assert_eq!(
            document.attribute(content(rule), "data-variation").unwrap().as_deref(),
            Some("control")
        );
        let active = variation_button(rule, "control");
        assert_eq!(
            document.attribute(active, "class").unwrap().as_deref(),
            Some("abtest-variation active")
        );
        assert!(rule.text_content().contains("checkout-cta"));
        assert!(rule.text_content().contains(abtest_core::get_test_id()));
    });
}

#[test]
fn selecting_a_variation_swaps_content_and_keeps_buttons() {
    run_test_mount(|rule| {
        rule.set_content(experiment_preview(checkout())).expect("mount");
        rule.pump_until_idle().expect("settle");
        let panel = content(rule);
        let buttons: Vec<_> = ["control", "green", "banner"]
            .iter()
            .map(|id| variation_button(rule, id))
            .collect();
        rule.clear_mutations();

        rule.click(buttons[1]).expect("select green");

        assert_eq!(content(rule), panel);
        assert_eq!(rule.created_elements(), 0);
        let document = rule.document();
        assert_eq!(
            document.attribute(panel, "data-variation").unwrap().as_deref(),
            Some("green")
        );
        assert_eq!(
            document.attribute(buttons[1], "aria-pressed").unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(
            document.attribute(buttons[0], "aria-pressed").unwrap().as_deref(),
            Some("false")
        );
        assert!(rule.html().contains("Buy now"));
    });
}

#[test]
fn collapsing_hides_the_list_and_keeps_selection() {
    run_test_mount(|rule| {
        rule.set_content(experiment_preview(checkout())).expect("mount");
        let banner = variation_button(rule, "banner");
        rule.click(banner).expect("select banner");
        let toggle = rule.find_by_tag("button")[0];

        rule.click(toggle).expect("collapse");
        assert!(rule.find_by_tag("ul").is_empty());
        assert_eq!(rule.document().text_content(toggle), "+");

        rule.click(toggle).expect("expand");
        assert_eq!(rule.find_by_tag("ul").len(), 1);
        let banner = variation_button(rule, "banner");
        assert_eq!(
            rule.document().attribute(banner, "aria-pressed").unwrap().as_deref(),
            Some("true")
        );
    });
}

#[test]
fn unmount_removes_preview_and_toolbar() {
    run_test_mount(|rule| {
        rule.set_content(experiment_preview(checkout())).expect("mount");
        rule.pump_until_idle().expect("settle");

        rule.unmount().expect("unmount");

        assert!(rule.document().children(rule.body()).is_empty());
        assert!(!rule.renderer().should_tick());
    });
}
