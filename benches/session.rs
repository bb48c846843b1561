use criterion::{BatchSize, Criterion};
use curve_fit_gui::{FitGuiSession, FormValue, GuiConfig, MetaValues};
use curve_fit_gui_test_util::{poly_factory, poly_meta_config};
use std::hint::black_box;

fn poly_session(n_poly: i32) -> FitGuiSession {
    FitGuiSession::from_factory(
        poly_factory,
        poly_meta_config(),
        MetaValues::new().with("n_poly", n_poly),
        GuiConfig::default(),
    )
    .unwrap()
}

pub fn bench_prior_edit(c: &mut Criterion) {
    for n_poly in [2, 5, 10] {
        let session = poly_session(n_poly);
        let echo = session.layout().echo_event();
        let mut edited = echo.clone();
        edited.set_parameter("a0-sdev", 0.5);

        c.bench_function(&format!("echo event n_poly={n_poly}"), |b| {
            let mut session = session.clone();
            b.iter(|| session.handle_event(black_box(&echo)));
        });
        c.bench_function(&format!("prior edit n_poly={n_poly}"), |b| {
            b.iter_batched(
                || session.clone(),
                |mut session| session.handle_event(black_box(&edited)),
                BatchSize::SmallInput,
            );
        });
    }
}

pub fn bench_replay(c: &mut Criterion) {
    let session = poly_session(3);
    let mut events = vec![];
    for n_poly in [4.0, 5.0, 6.0] {
        let mut event = session.layout().echo_event();
        event.meta_values = vec![FormValue::Number(n_poly)];
        events.push(event);
    }

    c.bench_function("meta replay", |b| {
        b.iter_batched(
            || session.clone(),
            |mut session| {
                for event in &events {
                    session.handle_event(black_box(event));
                }
                session
            },
            BatchSize::SmallInput,
        );
    });
}
