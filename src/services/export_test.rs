use super::*;

fn student(name: &str) -> ExportStudent {
    ExportStudent {
        id: Uuid::nil(),
        name: name.into(),
        university_email: "amina@univ-tiaret.dz".into(),
        personal_email: None,
        status: "team_assigned".into(),
        archived: false,
        created_at: "2024-03-01T10:00:00Z".into(),
        team_members: Vec::new(),
        student_metrics: None,
        student_reflections: Vec::new(),
        student_action_plans: Vec::new(),
    }
}

#[test]
fn filename_uses_iso_date() {
    let date = time::Date::from_calendar_date(2024, time::Month::March, 7).unwrap();
    assert_eq!(export_filename(date, "csv"), "all_students_2024-03-07.csv");
    assert_eq!(export_filename(date, "json"), "all_students_2024-03-07.json");
}

#[test]
fn csv_header_is_fully_quoted() {
    let chunks = csv_chunks(&[]).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(
        chunks[0],
        "\"ID\",\"Name\",\"University Email\",\"Personal Email\",\"Status\",\"Team\",\"Role\",\"SRL Score\",\
         \"Technical Skills\",\"Collaboration\",\"Adaptability\",\"Consistency\",\"Problem Solving\",\"Created At\"\n"
    );
}

#[test]
fn csv_row_without_metrics_renders_zero_scores_and_empty_strings() {
    let chunks = csv_chunks(&[student("Amina")]).unwrap();
    assert_eq!(
        chunks[1],
        "\"00000000-0000-0000-0000-000000000000\",\"Amina\",\"amina@univ-tiaret.dz\",\"\",\"team_assigned\",\"\",\"\",\
         \"0\",\"0\",\"0\",\"0\",\"0\",\"0\",\"2024-03-01T10:00:00Z\"\n"
    );
}

#[test]
fn csv_row_uses_first_team_and_escapes_quotes() {
    let mut s = student("Amina \"Ami\" Benali");
    s.team_members.push(ExportMembership { team_id: Uuid::nil(), team_name: "Alpha".into(), role: Some("Leader".into()) });
    s.team_members.push(ExportMembership { team_id: Uuid::nil(), team_name: "Beta".into(), role: None });
    s.student_metrics = Some(SkillMetrics {
        technical_skills: 1,
        collaboration: 2,
        adaptability: 3,
        consistency: 4,
        problem_solving: 5,
        srl_score: 88,
    });
    let line = &csv_chunks(&[s]).unwrap()[1];
    assert!(line.contains("\"Amina \"\"Ami\"\" Benali\""));
    assert!(line.contains("\"Alpha\",\"Leader\",\"88\",\"1\",\"2\",\"3\",\"4\",\"5\""));
    assert!(!line.contains("Beta"));
}

#[test]
fn json_chunks_form_a_valid_array() {
    let chunks = json_chunks(&[student("A"), student("B")]).unwrap();
    let joined: String = chunks.concat();
    let parsed: serde_json::Value = serde_json::from_str(&joined).unwrap();
    let items = parsed.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["name"], "B");
    assert!(items[0]["student_metrics"].is_null());
    assert!(items[0]["team_members"].as_array().unwrap().is_empty());
}

#[test]
fn json_chunks_empty_export_is_empty_array() {
    let joined = json_chunks(&[]).unwrap().concat();
    let parsed: serde_json::Value = serde_json::from_str(&joined).unwrap();
    assert_eq!(parsed, serde_json::json!([]));
}
