// Propiedades que todo plan generado debe cumplir, verificadas sobre un
// catálogo mixto (cadenas, alternativas, corequisitos, niveles y secciones).
use quickplan::algorithm::conflict::to_minutes;
use quickplan::models::{CourseRef, Meeting, Quarter, Requirement, Standing, Weekday};
use quickplan::{generate_plan, Course, InMemoryCatalog, Plan, PlanRequest, PlannerConfig, Section, Term};
use std::collections::BTreeMap;

const HORIZON: usize = 12;

fn reference() -> Term {
    Term::new(2024, Quarter::Autumn)
}

fn add_sections(cat: &mut InMemoryCatalog, course: &str, slots: &[(&[Weekday], &str, &str)]) {
    let first = reference().next(false);
    for i in 0..HORIZON {
        let term = first.advance(i, false);
        for (n, (days, start, end)) in slots.iter().enumerate() {
            cat.insert_section(Section {
                section_id: format!("{}-{:02}-{}", course.replace(' ', ""), i, n),
                course_id: course.to_string(),
                term,
                meetings: days.iter().map(|d| Meeting::new(*d, start, end)).collect(),
                location: "Eaton 101".to_string(),
                instructor: "Staff".to_string(),
            });
        }
    }
}

fn fixture() -> InMemoryCatalog {
    use Weekday::*;
    let mwf: &[Weekday] = &[Monday, Wednesday, Friday];
    let tr: &[Weekday] = &[Tuesday, Thursday];

    let mut cat = InMemoryCatalog::new()
        .with_course(Course::new("CSC 1230", 5))
        .with_course(
            Course::new("CSC 1240", 5).with_prerequisites(Requirement::all_of(vec![CourseRef::new("CSC 1230", 5)])),
        )
        .with_course(
            Course::new("CSC 2430", 5).with_prerequisites(Requirement::any_of(vec![
                CourseRef::new("CSC 1240", 5),
                CourseRef::new("CSC 1260", 10),
            ])),
        )
        .with_course(Course::new("CSC 1260", 10))
        .with_course(Course::new("MAT 1720", 5))
        .with_course(
            Course::new("MAT 1721", 5).with_prerequisites(Requirement::all_of(vec![CourseRef::new("MAT 1720", 5)])),
        )
        .with_course(
            Course::new("PHY 1121", 5)
                .with_prerequisites(Requirement::all_of(vec![CourseRef::new("MAT 1721", 5).concurrent()]))
                .with_corequisites(&["PHY 1123"]),
        )
        .with_course(Course::new("PHY 1123", 1))
        .with_course(
            Course::new("CSC 3430", 5)
                .with_prerequisites(Requirement::all_of(vec![
                    CourseRef::new("CSC 2430", 5),
                    CourseRef::new("MAT 1721", 5),
                ]))
                .with_standings(&[Standing::Junior, Standing::Senior]),
        )
        .with_course(
            Course::new("CSC 4899", 3)
                .with_prerequisites(Requirement::all_of(vec![CourseRef::new("CSC 3430", 5)]))
                .with_standings(&[Standing::Senior]),
        );

    add_sections(&mut cat, "CSC 1230", &[(mwf, "9:00 AM", "9:50 AM"), (tr, "1:30 PM", "2:50 PM")]);
    add_sections(&mut cat, "CSC 1240", &[(mwf, "9:00 AM", "9:50 AM")]);
    add_sections(&mut cat, "MAT 1720", &[(mwf, "09:00", "09:50"), (mwf, "11:00", "11:50")]);
    add_sections(&mut cat, "MAT 1721", &[(mwf, "11:00 AM", "11:50 AM"), (tr, "9:00 AM", "10:20 AM")]);
    add_sections(&mut cat, "PHY 1121", &[(mwf, "11:00 AM", "11:50 AM"), (mwf, "2:00 PM", "2:50 PM")]);
    add_sections(&mut cat, "PHY 1123", &[(tr, "2:00 PM", "4:50 PM")]);
    add_sections(&mut cat, "CSC 2430", &[(tr, "10:30 AM", "11:50 AM")]);
    add_sections(&mut cat, "CSC 3430", &[(mwf, "1:00 PM", "1:50 PM")]);
    cat
}

fn requests() -> Vec<PlanRequest> {
    vec![
        PlanRequest::new(15, &["CSC 3430", "PHY 1121"], reference()).with_completed(&[], 90),
        PlanRequest::new(10, &["CSC 2430", "MAT 1721"], reference()),
        PlanRequest::new(18, &["CSC 4899"], reference()).with_completed(&["CSC 1230", "MAT 1720"], 120),
        PlanRequest::new(20, &["CSC 3430", "CSC 1260", "PHY 1121"], reference()).with_completed(&["CSC 1230"], 80),
    ]
}

fn config() -> PlannerConfig {
    PlannerConfig { horizon: HORIZON, ..PlannerConfig::default() }
}

fn placed(plan: &Plan) -> BTreeMap<String, usize> {
    let mut out = BTreeMap::new();
    for q in plan.quarters.iter() {
        for c in q.courses.iter() {
            assert!(out.insert(c.course_id.clone(), q.index).is_none(), "{} placed twice", c.course_id);
        }
    }
    out
}

fn meetings_overlap(a: &Meeting, b: &Meeting) -> bool {
    if a.weekday != b.weekday {
        return false;
    }
    match (to_minutes(&a.start_time), to_minutes(&a.end_time), to_minutes(&b.start_time), to_minutes(&b.end_time)) {
        (Some(s1), Some(e1), Some(s2), Some(e2)) => s1 < e2 && s2 < e1,
        _ => false,
    }
}

#[test]
fn every_course_has_a_prerequisite_alternative_placed_before_it() {
    let cat = fixture();
    for req in requests() {
        let plan = generate_plan(&cat, &req, config()).unwrap();
        let at = placed(&plan);
        for (code, &q) in at.iter() {
            let course = cat.get_course(code);
            if course.prerequisites.is_empty() {
                continue;
            }
            let ok = course.prerequisites.alternatives.iter().any(|alt| {
                alt.members.iter().all(|m| {
                    if req.completed_courses.contains(&m.course_id) {
                        return true;
                    }
                    match at.get(&m.course_id) {
                        Some(&p) if m.concurrent_available => p <= q,
                        Some(&p) => p < q,
                        None => false,
                    }
                })
            });
            assert!(ok, "{} placed in {} before its prerequisites", code, q);
        }
    }
}

#[test]
fn bucket_credits_never_exceed_cap() {
    let cat = fixture();
    for req in requests() {
        let plan = generate_plan(&cat, &req, config()).unwrap();
        for q in plan.quarters.iter() {
            let sum: u32 = q.courses.iter().map(|c| c.credits).sum();
            assert_eq!(sum, q.credits);
            assert!(q.credits <= req.max_credits, "bucket {} holds {} > {}", q.index, q.credits, req.max_credits);
        }
    }
}

#[test]
fn chosen_sections_never_overlap_within_a_bucket() {
    let cat = fixture();
    for req in requests() {
        let plan = generate_plan(&cat, &req, config()).unwrap();
        for q in plan.quarters.iter() {
            let meetings: Vec<(&str, &Meeting)> = q
                .courses
                .iter()
                .flat_map(|c| c.meetings.iter().map(move |m| (c.course_id.as_str(), m)))
                .collect();
            for (i, (ca, a)) in meetings.iter().enumerate() {
                for (cb, b) in meetings.iter().skip(i + 1) {
                    if ca != cb {
                        assert!(!meetings_overlap(a, b), "{} and {} overlap in bucket {}", ca, cb, q.index);
                    }
                }
            }
        }
    }
}

#[test]
fn corequisites_share_a_bucket() {
    let cat = fixture();
    let plan = generate_plan(&cat, &requests()[0], config()).unwrap();
    assert_eq!(plan.quarter_of("PHY 1121"), plan.quarter_of("PHY 1123"));
    // MAT 1721 puede cursarse en paralelo con PHY 1121
    assert!(plan.quarter_of("MAT 1721") <= plan.quarter_of("PHY 1121"));
}

#[test]
fn senior_only_course_waits_for_senior_standing() {
    let cat = fixture();
    let plan = generate_plan(&cat, &requests()[2], config()).unwrap();
    let q = plan.quarter_of("CSC 4899").unwrap();
    assert!(plan.quarters[q].projected_credits >= 135);
    for req in requests() {
        let plan = generate_plan(&cat, &req, config()).unwrap();
        for bucket in plan.quarters.iter() {
            if bucket.contains("CSC 3430") {
                assert!(bucket.projected_credits >= 90);
            }
        }
    }
}

#[test]
fn identical_inputs_give_identical_plans() {
    let cat = fixture();
    for req in requests() {
        let first = generate_plan(&cat, &req, config()).unwrap();
        for _ in 0..3 {
            assert_eq!(generate_plan(&cat, &req, config()).unwrap(), first);
        }
    }
}

#[test]
fn buckets_are_consecutive_terms() {
    let cat = fixture();
    for req in requests() {
        let plan = generate_plan(&cat, &req, config()).unwrap();
        let mut term = reference();
        for (i, q) in plan.quarters.iter().enumerate() {
            term = term.next(false);
            assert_eq!(q.index, i);
            assert_eq!(q.term, term);
            assert_ne!(q.term.quarter, Quarter::Summer);
        }
    }
}

trait CourseLookup {
    fn get_course(&self, code: &str) -> Course;
}

impl CourseLookup for InMemoryCatalog {
    fn get_course(&self, code: &str) -> Course {
        use quickplan::CatalogAccessor;
        self.get_courses(&[code.to_string()]).unwrap().remove(0)
    }
}
