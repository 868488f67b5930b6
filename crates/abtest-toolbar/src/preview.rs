use std::rc::Rc;

use abtest_core::{children, create_element, fragment, use_state, Child, Component, Props, VNode};
use log::warn;

use crate::toolbar::{toolbar, ToolbarConfig, Variation};

const EXPERIMENT: &str = "experiment";

/// An experiment and its variations, in display order.
#[derive(Clone, Debug, PartialEq)]
pub struct Experiment {
    pub name: String,
    pub variations: Vec<Variation>,
}

impl Experiment {
    pub fn new(name: impl Into<String>, variations: Vec<Variation>) -> Self {
        Self {
            name: name.into(),
            variations,
        }
    }
}

/// Renders the active variation's markup followed by the toolbar that
/// switches it. The first variation starts active.
pub fn experiment_preview(experiment: Experiment) -> VNode {
    create_element(
        Component::named("ExperimentPreview", render_preview),
        Props::new().data(EXPERIMENT, experiment),
        vec![],
    )
}

fn render_preview(props: &Props) -> Child {
    let Some(experiment) = props.get_data::<Experiment>(EXPERIMENT) else {
        return Child::Empty;
    };
    let first = experiment
        .variations
        .first()
        .map(|variation| variation.id.clone())
        .unwrap_or_default();
    let (active, set_active) = use_state(|| first);

    let Some(variation) = experiment
        .variations
        .iter()
        .find(|variation| variation.id == active)
    else {
        warn!("{}: unknown variation {active}", experiment.name);
        return Child::Empty;
    };

    let content = create_element(
        "div",
        Props::new()
            .class("abtest-content")
            .attr("data-variation", variation.id.as_str())
            .inner_html(variation.html.as_str()),
        vec![],
    );
    let bar = toolbar(ToolbarConfig {
        experiment: experiment.name.clone(),
        variations: experiment.variations.clone(),
        active: active.clone(),
        on_select: Rc::new(move |id| set_active.set(id.to_string())),
    });
    fragment(children![content, bar]).into()
}
