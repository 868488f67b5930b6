use abtest_core::{create_element, get_test_id, Host, MemoryDocument, Props, RenderError};
use abtest_runtime_std::StdRuntime;
use abtest_toolbar::{experiment_preview, Experiment, Variation};
use log::info;

fn checkout() -> Experiment {
    Experiment::new(
        "checkout-cta",
        vec![
            Variation::new("control", "Control", "<button>Buy</button>"),
            Variation::new(
                "green",
                "Green button",
                "<button class=\"green\">Buy now</button>",
            ),
            Variation::new(
                "banner",
                "Shipping banner",
                "<div class=\"banner\">Free shipping today</div><button>Buy</button>",
            ),
        ],
    )
}

fn print_page(title: &str, document: &MemoryDocument) {
    println!("--- {title} ---");
    for node in document.children(document.body()) {
        println!("{}", document.to_html(node));
    }
    println!();
}

fn main() -> Result<(), RenderError> {
    env_logger::init();

    println!("=== Experiment Toolbar Demo ===");
    println!("test id: {}", get_test_id());
    println!();

    let runtime = StdRuntime::new();
    let mut renderer = runtime.renderer(MemoryDocument::new());

    let body = renderer.host().body();
    let page = renderer.append(
        create_element(
            "main",
            Props::new().attr("id", "app"),
            vec![create_element("h1", Props::new(), vec!["Checkout".into()]).into()],
        ),
        body,
        false,
    )?;
    let Some(heading) = page
        .node()
        .and_then(|main| renderer.host().first_child(main))
    else {
        return Ok(());
    };

    let preview = renderer.insert_after(experiment_preview(checkout()), heading, true)?;
    runtime.pump(&mut renderer)?;
    print_page("initial", renderer.host());

    let green = renderer
        .host()
        .query_attribute(body, "data-variation", "green")
        .into_iter()
        .find(|&node| renderer.host().tag(node) == Some("button"));
    if let Some(button) = green {
        let invoked = renderer.host().dispatch_event(button, "click");
        let ticks = runtime.pump(&mut renderer)?;
        info!("click reached {invoked} listeners, settled in {ticks} ticks");
        print_page("after selecting green", renderer.host());
    }

    // Injecting again replaces the marked output of the previous run.
    let again = renderer.insert_after(experiment_preview(checkout()), heading, true)?;
    runtime.pump(&mut renderer)?;
    info!(
        "re-injected as root {} (previous root {})",
        again.root(),
        preview.root()
    );
    print_page("re-injected", renderer.host());

    renderer.unmount(&again)?;
    print_page("unmounted", renderer.host());
    Ok(())
}
