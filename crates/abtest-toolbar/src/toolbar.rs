use std::rc::Rc;

use abtest_core::{
    children, create_element, get_test_id, use_effect_with, use_ref, use_state, Child,
    Component, NodeId, NodeRef, Props, VNode,
};
use log::{debug, info, warn};

const CONFIG: &str = "toolbarConfig";

/// One selectable branch of an experiment.
#[derive(Clone, Debug, PartialEq)]
pub struct Variation {
    pub id: String,
    pub label: String,
    pub html: String,
}

impl Variation {
    pub fn new(id: impl Into<String>, label: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            html: html.into(),
        }
    }
}

pub type SelectHandler = Rc<dyn Fn(&str)>;

/// Everything the toolbar shows. `active` is owned by the caller; clicks are
/// reported through `on_select`.
#[derive(Clone)]
pub struct ToolbarConfig {
    pub experiment: String,
    pub variations: Vec<Variation>,
    pub active: String,
    pub on_select: SelectHandler,
}

pub fn toolbar(config: ToolbarConfig) -> VNode {
    create_element(
        Component::named("Toolbar", render_toolbar),
        Props::new().key("abtest-toolbar").data(CONFIG, config),
        vec![],
    )
}

fn render_toolbar(props: &Props) -> Child {
    let Some(config) = props.get_data::<ToolbarConfig>(CONFIG) else {
        warn!("toolbar rendered without a configuration");
        return Child::Empty;
    };
    let (collapsed, set_collapsed) = use_state(|| false);
    let container: NodeRef = use_ref(|| None::<NodeId>);

    let observed = container.clone();
    let experiment = config.experiment.clone();
    let active = config.active.clone();
    use_effect_with(active.clone(), move |scope| {
        info!(
            "{experiment}: variation {active} active (toolbar #{:?})",
            observed.current()
        );
        scope.on_cleanup(move || debug!("{experiment}: variation {active} deactivated"))
    });

    let toggle = create_element(
        "button",
        Props::new()
            .class("abtest-toggle")
            .attr("aria-expanded", if collapsed { "false" } else { "true" })
            .on("click", move |_| set_collapsed.set(!collapsed)),
        children![if collapsed { "+" } else { "-" }],
    );
    let header = create_element(
        "header",
        Props::new(),
        children![
            toggle,
            create_element("strong", Props::new(), children![config.experiment.as_str()]),
            create_element("code", Props::new(), children![get_test_id()]),
        ],
    );
    let list = (!collapsed).then(|| variation_list(config));

    create_element(
        "div",
        Props::new().class("abtest-toolbar").node_ref(&container),
        children![header, list],
    )
    .into()
}

fn variation_list(config: &ToolbarConfig) -> VNode {
    let items = config
        .variations
        .iter()
        .map(|variation| {
            let selected = variation.id == config.active;
            let on_select = Rc::clone(&config.on_select);
            let id = variation.id.clone();
            let button = create_element(
                "button",
                Props::new()
                    .class(if selected {
                        "abtest-variation active"
                    } else {
                        "abtest-variation"
                    })
                    .attr("data-variation", variation.id.as_str())
                    .attr("aria-pressed", if selected { "true" } else { "false" })
                    .on("click", move |_| on_select(&id)),
                children![variation.label.as_str()],
            );
            create_element("li", Props::new().key(variation.id.as_str()), children![button]).into()
        })
        .collect();
    create_element("ul", Props::new().class("abtest-variations"), items)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use abtest_core::{Host, MemoryDocument, Renderer};

    use super::*;

    fn config(active: &str, picked: Rc<RefCell<Vec<String>>>) -> ToolbarConfig {
        ToolbarConfig {
            experiment: "checkout-cta".into(),
            variations: vec![
                Variation::new("control", "Control", "<p>Buy</p>"),
                Variation::new("green", "Green", "<p class=\"green\">Buy</p>"),
            ],
            active: active.into(),
            on_select: Rc::new(move |id| picked.borrow_mut().push(id.to_string())),
        }
    }

    #[test]
    fn marks_the_active_variation() {
        let mut renderer = Renderer::new(MemoryDocument::new());
        let body = renderer.host().body();
        let picked = Rc::new(RefCell::new(Vec::new()));
        renderer
            .append(toolbar(config("green", picked)), body, false)
            .expect("mount toolbar");

        let document = renderer.host();
        let pressed: Vec<_> = document
            .elements_by_tag(body, "button")
            .into_iter()
            .filter_map(|button| document.attribute(button, "aria-pressed").ok().flatten())
            .collect();
        assert_eq!(pressed, vec!["false", "true"]);
    }

    #[test]
    fn missing_configuration_renders_nothing() {
        let mut renderer = Renderer::new(MemoryDocument::new());
        let body = renderer.host().body();
        let handle = renderer
            .append(
                create_element(Component::named("Toolbar", render_toolbar), Props::new(), vec![]),
                body,
                false,
            )
            .expect("mount");
        assert!(handle.nodes().is_empty());
        assert!(renderer.host().children(body).is_empty());
    }
}
