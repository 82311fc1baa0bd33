use hs_scraper::source::HtmlDocument;
use hs_scraper::{extract, filter, ExtractError, FieldLocator, FieldType, FilterCriteria, RecordBoundaryLocator, Value};

fn roster_page() -> HtmlDocument {
    HtmlDocument::parse(include_str!("fixtures/maxpreps_roster.html"))
}

fn roster_fields() -> Vec<FieldLocator> {
    vec![
        FieldLocator::text("name", "td a"),
        FieldLocator::text("grade", "td:nth-child(3)").with_default("N/A"),
    ]
}

#[test]
fn test_record_count_matches_boundary_count() {
    let page = roster_page();
    let table = extract(&page, &RecordBoundaryLocator::css("tbody tr"), &roster_fields(), None).unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(table.schema().names().collect::<Vec<_>>(), vec!["name", "grade"]);
    for record in &table {
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["name", "grade"]);
    }
}

#[test]
fn test_missing_grade_uses_declared_default() {
    let table = extract(&roster_page(), &RecordBoundaryLocator::css("tbody tr"), &roster_fields(), None).unwrap();

    let sam = &table.records()[2];
    assert_eq!(sam.get("name"), Some(&Value::from("Sam Ortiz")));
    assert_eq!(sam.get("grade"), Some(&Value::from("N/A")));
    // Whitespace inside the link text is collapsed
    assert_eq!(table.records()[0].get("name"), Some(&Value::from("Jordan Lee")));
}

#[test]
fn test_zero_boundary_matches_is_empty_table() {
    let table = extract(&roster_page(), &RecordBoundaryLocator::css("ul.cards li"), &roster_fields(), None).unwrap();
    assert!(table.is_empty());
}

#[test]
fn test_malformed_boundary_is_invalid_locator() {
    let err = extract(&roster_page(), &RecordBoundaryLocator::css("tbody tr["), &roster_fields(), None).unwrap_err();
    assert!(matches!(err, ExtractError::InvalidLocator { .. }));
    assert!(!err.is_transient());
}

#[test]
fn test_malformed_field_selector_fails_even_without_records() {
    let fields = vec![FieldLocator::text("name", "a[href")];
    let err = extract(&roster_page(), &RecordBoundaryLocator::css("ul.cards li"), &fields, None).unwrap_err();
    assert!(matches!(err, ExtractError::InvalidLocator { .. }));
}

#[test]
fn test_typed_fields_and_filter_roundtrip() {
    let fields = vec![
        FieldLocator::text("number", "td:nth-child(1)")
            .with_pattern(r"(\d+)")
            .with_type(FieldType::Integer),
        FieldLocator::text("name", "td a"),
        FieldLocator::text("grade", "td:nth-child(3)").with_default("N/A"),
    ];
    let table = extract(&roster_page(), &RecordBoundaryLocator::css("tbody tr"), &fields, None).unwrap();
    let numbers: Vec<&Value> = table.column("number").unwrap().collect();
    assert_eq!(numbers, vec![&Value::Integer(2), &Value::Integer(14), &Value::Empty]);

    let criteria = FilterCriteria::new().allow("grade", ["Sr.", "Jr."]);
    let upperclassmen = filter(&table, &criteria);
    assert_eq!(upperclassmen.len(), 2);
    assert_eq!(filter(&upperclassmen, &criteria), upperclassmen);
    assert_eq!(filter(&table, &FilterCriteria::new()), table);
}

#[test]
fn test_scoped_source_ignores_rows_outside_scope() {
    let page = HtmlDocument::parse(
        r#"<table id="jv"><tbody><tr><td>1</td><td><a href="/a">JV Kid</a></td></tr></tbody></table>
           <table id="varsity"><tbody><tr><td>7</td><td><a href="/b">Varsity Kid</a></td></tr></tbody></table>"#,
    );
    let scope = page
        .scope(&hs_scraper::locator::Locator::css("#varsity").compile().unwrap())
        .unwrap();
    let table = extract(&scope, &RecordBoundaryLocator::css("tr"), &[FieldLocator::text("name", "td a")], None).unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.records()[0].get("name"), Some(&Value::from("Varsity Kid")));
}
