//! Explore calendars and explore files.

use semantic_patterns::generate::{compile, GeneratedFiles, GeneratorOptions};
use semantic_patterns::loader::{load_str, Format};

const MODELS: &str = r#"
- kind: semantic_model
  name: rentals
  entities:
    - { name: rental, type: primary, expr: rental_id }
    - { name: facility, type: foreign, expr: facility_id }
  dimensions:
    - { name: status, type: categorical, expr: status }
    - { name: created_at, type: time, granularity: day, expr: created_at }
    - { name: booked_at, type: time, granularity: hour, expr: booked_at }
  measures:
    - { name: amount, agg: sum }
  date_selector:
    dimensions: [created_at, booked_at]
- kind: semantic_model
  name: facilities
  entities:
    - { name: facility, type: primary, expr: facility_id }
  dimensions:
    - { name: opened_at, type: time, granularity: month, expr: opened_on }
  date_selector: {}
- kind: semantic_model
  name: payments
  entities:
    - { name: payment, type: primary, expr: payment_id }
  dimensions:
    - { name: paid_at, type: time, expr: paid_at }
  measures:
    - { name: paid, agg: sum }
"#;

fn compile_with(extra: &str, options: GeneratorOptions) -> GeneratedFiles {
    let yaml = format!("{}{}", MODELS, extra);
    let declarations = load_str(&yaml, Format::Yaml, "calendar.yml").unwrap();
    compile(&declarations, &options).unwrap().files
}

fn fact_options(models: &[&str]) -> GeneratorOptions {
    GeneratorOptions {
        fact_models: models.iter().map(|m| m.to_string()).collect(),
        ..GeneratorOptions::default()
    }
}

#[test]
fn test_calendar_lists_selector_dimensions_of_all_participants() {
    let files = compile_with("", fact_options(&["rentals"]));
    let calendar = files.get("explores/rentals_calendar.view.lkml").unwrap();
    insta::assert_snapshot!(calendar, @r###"
    # Generated by semantic-patterns. Do not edit: changes are overwritten on the next compile.

    view: rentals_calendar {
      parameter: date_field {
        label: "Date Field"
        type: unquoted
        allowed_value: {
          label: "Rentals Created At"
          value: "rentals__created_at"
        }
        allowed_value: {
          label: "Rentals Booked At"
          value: "rentals__booked_at"
        }
        allowed_value: {
          label: "Facilities Opened At"
          value: "facilities__opened_at"
        }
        default_value: "rentals__created_at"
      }

      dimension_group: date {
        label: "Date"
        type: time
        timeframes: [time, hour, date, week, month, quarter, year]
        convert_tz: no
        sql: CASE '{% parameter date_field %}' WHEN 'rentals__created_at' THEN rentals.created_at WHEN 'rentals__booked_at' THEN rentals.booked_at WHEN 'facilities__opened_at' THEN facilities.opened_on END ;;
      }
    }
    "###);
}

#[test]
fn test_explore_includes_and_joins_its_calendar() {
    let files = compile_with("", fact_options(&["rentals"]));
    let explore = files.get("explores/rentals.explore.lkml").unwrap();
    insta::assert_snapshot!(explore, @r###"
    # Generated by semantic-patterns. Do not edit: changes are overwritten on the next compile.

    include: "/views/rentals.*view.lkml"
    include: "/views/facilities.*view.lkml"
    include: "/explores/rentals_calendar.view.lkml"

    explore: rentals {

      join: facilities {
        type: left_outer
        relationship: many_to_one
        sql_on: rentals.facility_id = facilities.facility_id ;;
      }

      join: calendar {
        from: rentals_calendar
        relationship: one_to_one
        sql: ;;
        required_joins: [facilities]
      }
    }
    "###);
}

#[test]
fn test_no_selector_means_no_calendar() {
    let files = compile_with("", fact_options(&["payments"]));
    assert!(files.get("explores/payments_calendar.view.lkml").is_none());
    let explore = files.get("explores/payments.explore.lkml").unwrap();
    assert!(!explore.contains("calendar"));
}

#[test]
fn test_one_calendar_per_explore() {
    let files = compile_with(
        r#"
- kind: explore
  name: rental_analysis
  fact_model: rentals
- kind: explore
  name: facility_overview
  fact_model: facilities
"#,
        fact_options(&["rentals"]),
    );
    let calendars: Vec<&str> = files
        .paths()
        .filter(|p| p.ends_with("_calendar.view.lkml"))
        .collect();
    // `rentals` is covered by `rental_analysis`, so no default explore is added
    assert_eq!(
        calendars,
        vec![
            "explores/facility_overview_calendar.view.lkml",
            "explores/rental_analysis_calendar.view.lkml",
        ]
    );

    // rentals joins facilities through its foreign `facility` entity, so its
    // selector dimensions follow the fact model's
    let overview = files.get("explores/facility_overview_calendar.view.lkml").unwrap();
    assert_eq!(overview.matches("parameter: date_field").count(), 1);
    assert_eq!(overview.matches("dimension_group: date").count(), 1);
    assert!(overview.contains("default_value: \"facilities__opened_at\""));
    assert!(overview.contains("value: \"rentals__booked_at\""));
}

#[test]
fn test_prefixes_and_calendar_alias() {
    let options = GeneratorOptions {
        view_prefix: "sp_".into(),
        explore_prefix: "x_".into(),
        calendar_alias: "cal".into(),
        ..fact_options(&["rentals"])
    };
    let files = compile_with("", options);

    let calendar = files.get("explores/x_rentals_calendar.view.lkml").unwrap();
    assert!(calendar.contains("view: x_rentals_calendar {"));
    assert!(calendar.contains("WHEN 'rentals__created_at' THEN sp_rentals.created_at"));

    let explore = files.get("explores/x_rentals.explore.lkml").unwrap();
    assert!(explore.contains("include: \"/views/rentals.*view.lkml\""));
    assert!(explore.contains("explore: x_rentals {\n  view_name: sp_rentals\n"));
    assert!(explore.contains("sql_on: sp_rentals.facility_id = sp_facilities.facility_id ;;"));
    assert!(explore.contains("join: cal {\n    from: x_rentals_calendar\n"));
    assert!(explore.contains("    required_joins: [sp_facilities]\n"));

    assert!(files.get("views/rentals.view.lkml").unwrap().contains("view: sp_rentals {"));
}

#[test]
fn test_convert_tz_follows_options() {
    let options = GeneratorOptions {
        convert_tz: true,
        ..fact_options(&["facilities"])
    };
    let files = compile_with("", options);
    let calendar = files.get("explores/facilities_calendar.view.lkml").unwrap();
    assert!(calendar.contains("convert_tz: yes"));
}

#[test]
fn test_calendar_joins_only_the_views_it_reads() {
    // facilities has no selector here, so the calendar reads rentals only
    let yaml = MODELS.replace("  date_selector: {}\n", "");
    let declarations = load_str(&yaml, Format::Yaml, "calendar.yml").unwrap();
    let files = compile(&declarations, &fact_options(&["rentals"])).unwrap().files;

    let calendar = files.get("explores/rentals_calendar.view.lkml").unwrap();
    assert!(!calendar.contains("facilities__opened_at"));
    let explore = files.get("explores/rentals.explore.lkml").unwrap();
    assert!(explore.contains("join: facilities {"));
    assert!(explore.contains("  join: calendar {\n    from: rentals_calendar\n    relationship: one_to_one\n    sql: ;;\n  }\n"));
    assert!(!explore.contains("required_joins"));
}
