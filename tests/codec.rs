use curve_fit_gui::codec::{flatten, parse_qualified_id, unflatten};
use curve_fit_gui::*;
use curve_fit_gui_test_util::*;

fn form(params: &ParameterSet) -> FlatForm {
    flatten(params).into_iter().collect()
}

#[test]
fn demo_priors_survive_flattening() {
    for prior in [poly_prior(7), exp_sum_prior(3), multi_key_prior()] {
        let decoded = unflatten(&form(&prior), &prior).unwrap();
        assert_eq!(decoded, prior);
    }
}

#[test]
fn flat_ids_are_unique_and_parseable() {
    let prior = ParameterSet::new()
        .with_scalar("a_b", 1.0, 0.1)
        .with_array("c", &[(1.0, 0.1); 11]);
    let entries = flatten(&prior);
    assert_eq!(entries.len(), 2 * prior.n_estimates());
    for entry in &entries {
        let id = parse_qualified_id(&entry.qualified_id).unwrap();
        assert_eq!(id.to_string(), entry.qualified_id);
    }
    let ids: Vec<_> = entries.iter().map(|e| e.qualified_id.as_str()).collect();
    assert_eq!(ids[0], "a_b-mean");
    assert_eq!(ids[2 + 2 * 10], "c__array_10-mean");
}

#[test]
fn unknown_fields_are_ignored() {
    let prior = poly_prior(2);
    let mut form = form(&prior);
    form.insert("b-mean", 3.0);
    assert_eq!(unflatten(&form, &prior).unwrap(), prior);
}

#[test]
fn shape_comes_from_hint() {
    let prior = exp_sum_prior(2);
    let shorter = exp_sum_prior(1);
    let decoded = unflatten(&form(&prior), &shorter).unwrap();
    assert_eq!(decoded, shorter);
    assert_eq!(
        unflatten(&form(&shorter), &prior),
        Err(DecodeError::MissingField("a__array_1-mean".into()))
    );
}

#[test]
fn exported_poly_fit() {
    let fit = poly_fit(3).unwrap().with_meta(MetaValues::new().with("n_poly", 3));
    let json: serde_json::Value = serde_json::from_str(&export_json(&fit).unwrap()).unwrap();
    let prior = json["prior"].as_object().unwrap();
    assert_eq!(prior.keys().collect::<Vec<_>>(), ["a0", "a1", "a2"]);
    assert_eq!(json["prior"]["a2"]["sdev"], 3.0);
    assert_eq!(json["meta"]["n_poly"], 3.0);
    assert!(json["posterior"]["a0"]["sdev"].as_f64().unwrap() < 1.0);
}

#[test]
fn meta_round_trip_through_layout() {
    let meta = MetaValues::new().with("n_poly", 4);
    let config = poly_meta_config();
    let layout = DashboardLayout::from_fit(
        &poly_fit(4).unwrap(),
        &GuiConfig::default(),
        Some(&config),
        &meta,
        &PlotRegistry::empty(),
    );
    let event = layout.echo_event();
    let decoded = codec::decode(&event.meta_values, Some(&config)).unwrap();
    assert_eq!(decoded, meta);
}
