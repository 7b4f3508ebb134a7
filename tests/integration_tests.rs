use registrar::{decode, encode, load, save, Registrar, Status};

fn sample_store() -> Registrar {
    let mut registrar = Registrar::new();
    registrar
        .register("S1", "Ada Lovelace", "Mathematics")
        .unwrap();
    registrar.register("S2", "Grace Hopper", "").unwrap();
    registrar
        .mark_attendance("S1", "2024-01-10", Status::Present)
        .unwrap();
    registrar
        .mark_attendance("S1", "2024-01-11", Status::Late)
        .unwrap();
    registrar
        .mark_attendance("S1", "2024-01-12", Status::Absent)
        .unwrap();
    registrar
}

#[test]
fn sanity() {
    let registrar = sample_store();

    let mut output = Vec::new();
    encode(&registrar, &mut output).unwrap();

    let expected = "\
ID,Name,Program,Date,Status
S1,Ada Lovelace,Mathematics,2024-01-10,Present
S1,Ada Lovelace,Mathematics,2024-01-11,Late
S1,Ada Lovelace,Mathematics,2024-01-12,Absent
S2,Grace Hopper,,None,None
";
    assert_eq!(output, expected.as_bytes());
}

#[test]
fn round_trip_preserves_store() {
    let registrar = sample_store();

    let mut output = Vec::new();
    encode(&registrar, &mut output).unwrap();
    let decoded = decode(output.as_slice()).unwrap();

    assert_eq!(decoded.students(), registrar.students());
}

#[test]
fn round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("students.csv");

    let registrar = sample_store();
    save(&registrar, &path).unwrap();
    let reloaded = load(&path).unwrap();

    assert_eq!(reloaded.students(), registrar.students());
}

#[test]
fn load_of_missing_file_is_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let registrar = load(dir.path().join("does-not-exist.csv")).unwrap();
    assert!(registrar.students().is_empty());
}

#[test]
fn save_is_a_full_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("students.csv");

    let mut registrar = sample_store();
    save(&registrar, &path).unwrap();

    // flip a status in place and save again: the file must show one row
    // for that date, not an appended duplicate
    registrar
        .mark_attendance("S1", "2024-01-10", Status::Absent)
        .unwrap();
    save(&registrar, &path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.matches("2024-01-10").count(), 1);
    assert!(contents.contains("S1,Ada Lovelace,Mathematics,2024-01-10,Absent"));

    let reloaded = load(&path).unwrap();
    assert_eq!(reloaded.students(), registrar.students());
}

#[test]
fn failed_mark_does_not_change_what_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("students.csv");

    let mut registrar = sample_store();
    save(&registrar, &path).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    assert!(registrar
        .mark_attendance("NOBODY", "2024-01-10", Status::Present)
        .is_err());
    save(&registrar, &path).unwrap();

    let after = std::fs::read_to_string(&path).unwrap();
    assert_eq!(before, after);
}
