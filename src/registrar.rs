use csv::WriterBuilder;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Sentinel stored in the Date and Status columns for a student with no
/// attendance records, so the student still survives a round-trip.
const NO_RECORD: &str = "None";

#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("student id '{0}' is already registered")]
    DuplicateId(String),
    #[error("no student with id '{0}'")]
    StudentNotFound(String),
    #[error("unrecognized attendance status '{0}'")]
    InvalidStatus(String),
    #[error("attendance history is full ({0} records)")]
    CapacityExceeded(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Present,
    Absent,
    Late,
}

impl Status {
    /// Late still counts as attended.
    pub fn attended(self) -> bool {
        !matches!(self, Status::Absent)
    }

    fn as_str(self) -> &'static str {
        match self {
            Status::Present => "Present",
            Status::Absent => "Absent",
            Status::Late => "Late",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Present" => Ok(Status::Present),
            "Absent" => Ok(Status::Absent),
            "Late" => Ok(Status::Late),
            other => Err(RegistrarError::InvalidStatus(other.to_string())),
        }
    }
}

/// One attendance entry. The date is an opaque `YYYY-MM-DD` string, only
/// ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub date: String,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    id: String,
    name: String,
    program: String,
    history: Vec<AttendanceRecord>,
}

impl Student {
    fn new(id: &str, name: &str, program: &str) -> Self {
        Student {
            id: id.to_string(),
            name: name.to_string(),
            program: program.to_string(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Empty when the student was registered without a program.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Records in the order they were first marked, one per distinct date.
    pub fn history(&self) -> &[AttendanceRecord] {
        &self.history
    }

    pub fn stats(&self) -> AttendanceStats {
        let mut stats = AttendanceStats::default();
        for record in &self.history {
            match record.status {
                Status::Present => stats.present += 1,
                Status::Absent => stats.absent += 1,
                Status::Late => stats.late += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceStats {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

impl AttendanceStats {
    pub fn total(&self) -> usize {
        self.present + self.absent + self.late
    }

    /// Attended share of all recorded classes, 0.0 for an empty history.
    pub fn percentage(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.present + self.late) as f64 / total as f64 * 100.0
    }
}

pub struct Registrar {
    students: Vec<Student>,
    record_capacity: Option<usize>,
}

impl Registrar {
    pub fn new() -> Self {
        Registrar {
            students: Vec::new(),
            record_capacity: None,
        }
    }

    /// Caps how many attendance records one student may accumulate.
    /// Marking past the cap fails instead of silently dropping the record.
    pub fn with_record_capacity(capacity: usize) -> Self {
        Registrar {
            students: Vec::new(),
            record_capacity: Some(capacity),
        }
    }

    /// Adds a student with an empty history. Ids are primary keys: a
    /// duplicate id fails and leaves the store untouched.
    pub fn register(
        &mut self,
        id: &str,
        name: &str,
        program: &str,
    ) -> Result<&Student, RegistrarError> {
        if self.find(id).is_some() {
            return Err(RegistrarError::DuplicateId(id.to_string()));
        }
        let index = self.students.len();
        self.students.push(Student::new(id, name, program));
        Ok(&self.students[index])
    }

    /// Exact, case-sensitive id match. Trimming is the caller's job.
    pub fn find(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|student| student.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Student> {
        self.students.iter_mut().find(|student| student.id == id)
    }

    /// Upsert by date: a record already present for this date gets its
    /// status overwritten in place, otherwise a new record is appended.
    pub fn mark_attendance(
        &mut self,
        id: &str,
        date: &str,
        status: Status,
    ) -> Result<(), RegistrarError> {
        let capacity = self.record_capacity;
        let student = self
            .find_mut(id)
            .ok_or_else(|| RegistrarError::StudentNotFound(id.to_string()))?;

        if let Some(record) = student.history.iter_mut().find(|r| r.date == date) {
            record.status = status;
            return Ok(());
        }
        if let Some(cap) = capacity {
            if student.history.len() >= cap {
                return Err(RegistrarError::CapacityExceeded(cap));
            }
        }
        student.history.push(AttendanceRecord {
            date: date.to_string(),
            status,
        });
        Ok(())
    }

    /// All students in registration order.
    pub fn students(&self) -> &[Student] {
        &self.students
    }

    /// Mean of every student's individual percentage, not a record-weighted
    /// average. A student with no records drags the average down as 0.0.
    pub fn class_average(&self) -> f64 {
        if self.students.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .students
            .iter()
            .map(|student| student.stats().percentage())
            .sum();
        sum / self.students.len() as f64
    }
}

impl Default for Registrar {
    fn default() -> Self {
        Registrar::new()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Program")]
    program: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Status")]
    status: String,
}

/// Rebuilds a store from its CSV form. Repeated rows for one id register
/// the student once and keep upserting records into the same entry, so a
/// file with duplicated rows still decodes to a valid store. Malformed
/// lines are logged and skipped, never fatal to the rest of the file.
pub fn decode<R: io::Read>(source: R) -> Result<Registrar, RegistrarError> {
    let mut registrar = Registrar::new();
    let mut reader = csv::Reader::from_reader(source);

    for row in reader.deserialize::<Row>() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping malformed line: {}", err);
                continue;
            }
        };

        if registrar.find(&row.id).is_none() {
            registrar.register(&row.id, &row.name, &row.program)?;
        }
        if row.date == NO_RECORD {
            continue;
        }
        let status = match row.status.parse::<Status>() {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    "skipping record for '{}': unrecognized status '{}'",
                    row.id, row.status
                );
                continue;
            }
        };
        registrar.mark_attendance(&row.id, &row.date, status)?;
    }

    Ok(registrar)
}

/// Writes the whole store out as CSV, one row per attendance record and a
/// sentinel row per record-less student. Each record is emitted from its
/// own position in its owning student's history.
pub fn encode<W: io::Write>(registrar: &Registrar, target: W) -> Result<(), RegistrarError> {
    let mut writer = WriterBuilder::new().from_writer(target);

    for student in registrar.students() {
        if student.history().is_empty() {
            writer.serialize(Row {
                id: student.id().to_string(),
                name: student.name().to_string(),
                program: student.program().to_string(),
                date: NO_RECORD.to_string(),
                status: NO_RECORD.to_string(),
            })?;
            continue;
        }
        for record in student.history() {
            writer.serialize(Row {
                id: student.id().to_string(),
                name: student.name().to_string(),
                program: student.program().to_string(),
                date: record.date.clone(),
                status: record.status.to_string(),
            })?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// A missing file is a first run, not an error: it loads as an empty store.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Registrar, RegistrarError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Registrar::new());
    }
    decode(File::open(path)?)
}

/// Full rewrite on every save, so the file always mirrors the store.
pub fn save<P: AsRef<Path>>(registrar: &Registrar, path: P) -> Result<(), RegistrarError> {
    encode(registrar, File::create(path)?)
}

#[test]
fn register_then_find() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "Mathematics").unwrap();

    let student = registrar.find("S1");
    assert!(student.is_some());
    let student = student.unwrap();
    assert_eq!(student.name(), "Ada Lovelace");
    assert_eq!(student.program(), "Mathematics");
    assert!(student.history().is_empty());
}

#[test]
fn duplicate_id_is_rejected() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "").unwrap();

    let result = registrar.register("S1", "Someone Else", "");
    assert!(matches!(result, Err(RegistrarError::DuplicateId(_))));
    assert_eq!(registrar.students().len(), 1);
    assert_eq!(registrar.find("S1").unwrap().name(), "Ada Lovelace");
}

#[test]
fn find_is_exact_and_case_sensitive() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "").unwrap();

    assert!(registrar.find("s1").is_none());
    assert!(registrar.find("S1 ").is_none());
}

#[test]
fn empty_history_has_zero_stats() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "").unwrap();

    let stats = registrar.find("S1").unwrap().stats();
    assert_eq!(stats.total(), 0);
    assert_eq!(stats.present, 0);
    assert_eq!(stats.absent, 0);
    assert_eq!(stats.late, 0);
    assert_eq!(stats.percentage(), 0.0);
}

#[test]
fn marking_same_date_twice_updates_in_place() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "").unwrap();

    registrar
        .mark_attendance("S1", "2024-01-10", Status::Present)
        .unwrap();
    registrar
        .mark_attendance("S1", "2024-01-10", Status::Absent)
        .unwrap();

    let history = registrar.find("S1").unwrap().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, "2024-01-10");
    assert_eq!(history[0].status, Status::Absent);
}

#[test]
fn late_counts_as_attended() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "").unwrap();

    registrar
        .mark_attendance("S1", "2024-01-10", Status::Present)
        .unwrap();
    registrar
        .mark_attendance("S1", "2024-01-11", Status::Absent)
        .unwrap();
    registrar
        .mark_attendance("S1", "2024-01-12", Status::Late)
        .unwrap();

    let stats = registrar.find("S1").unwrap().stats();
    assert_eq!(stats.total(), 3);
    assert_eq!((stats.present, stats.absent, stats.late), (1, 1, 1));
    assert_eq!(format!("{:.2}", stats.percentage()), "66.67");
}

#[test]
fn marking_unknown_student_fails() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "").unwrap();

    let result = registrar.mark_attendance("S2", "2024-01-10", Status::Present);
    assert!(matches!(result, Err(RegistrarError::StudentNotFound(_))));
    assert!(registrar.find("S1").unwrap().history().is_empty());
}

#[test]
fn record_capacity_is_enforced() {
    let mut registrar = Registrar::with_record_capacity(2);
    registrar.register("S1", "Ada Lovelace", "").unwrap();

    registrar
        .mark_attendance("S1", "2024-01-10", Status::Present)
        .unwrap();
    registrar
        .mark_attendance("S1", "2024-01-11", Status::Present)
        .unwrap();

    let result = registrar.mark_attendance("S1", "2024-01-12", Status::Present);
    assert!(matches!(result, Err(RegistrarError::CapacityExceeded(2))));

    // updating an existing date is not an append and still works at the cap
    registrar
        .mark_attendance("S1", "2024-01-10", Status::Late)
        .unwrap();
    let history = registrar.find("S1").unwrap().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, Status::Late);
}

#[test]
fn class_average_is_mean_of_percentages() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "").unwrap();
    registrar.register("S2", "Grace Hopper", "").unwrap();

    // S1: one class, attended. S2: four classes, one attended.
    registrar
        .mark_attendance("S1", "2024-01-10", Status::Present)
        .unwrap();
    for (date, status) in [
        ("2024-01-10", Status::Present),
        ("2024-01-11", Status::Absent),
        ("2024-01-12", Status::Absent),
        ("2024-01-13", Status::Absent),
    ] {
        registrar.mark_attendance("S2", date, status).unwrap();
    }

    // mean of 100% and 25%, not the record-weighted 2 of 5
    assert_eq!(registrar.class_average(), 62.5);
}

#[test]
fn class_average_of_empty_store_is_zero() {
    assert_eq!(Registrar::new().class_average(), 0.0);
}

#[test]
fn invalid_status_label_is_rejected() {
    let result = "Presnt".parse::<Status>();
    assert!(matches!(result, Err(RegistrarError::InvalidStatus(_))));
}

#[test]
fn decode_skips_malformed_lines() {
    let data = "\
ID,Name,Program,Date,Status
S1,Ada Lovelace,Mathematics,2024-01-10,Present
this,line,is,short
S2,Grace Hopper,,2024-01-10,Absnt
S2,Grace Hopper,,2024-01-11,Absent
";
    let registrar = decode(data.as_bytes()).unwrap();

    assert_eq!(registrar.students().len(), 2);
    assert_eq!(registrar.find("S1").unwrap().history().len(), 1);
    // the typoed status row is dropped, the well-formed one kept
    let history = registrar.find("S2").unwrap().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, "2024-01-11");
}

#[test]
fn decode_registers_each_id_once() {
    let data = "\
ID,Name,Program,Date,Status
S1,Ada Lovelace,Mathematics,2024-01-10,Present
S1,Ada Lovelace,Mathematics,2024-01-11,Late
S1,Ada Lovelace,Mathematics,2024-01-11,Absent
";
    let registrar = decode(data.as_bytes()).unwrap();

    assert_eq!(registrar.students().len(), 1);
    // the duplicated date upserts rather than duplicating the row
    let history = registrar.find("S1").unwrap().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].status, Status::Absent);
}

#[test]
fn sentinel_row_registers_without_records() {
    let data = "\
ID,Name,Program,Date,Status
S1,Ada Lovelace,,None,None
";
    let registrar = decode(data.as_bytes()).unwrap();

    let student = registrar.find("S1").unwrap();
    assert!(student.history().is_empty());
    assert_eq!(student.stats().percentage(), 0.0);
}

#[test]
fn encode_emits_sentinel_for_empty_history() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "").unwrap();

    let mut output = Vec::new();
    encode(&registrar, &mut output).unwrap();

    assert_eq!(
        output,
        b"ID,Name,Program,Date,Status\nS1,Ada Lovelace,,None,None\n"
    );
}

#[test]
fn encode_keeps_each_record_with_its_own_date() {
    let mut registrar = Registrar::new();
    registrar.register("S1", "Ada Lovelace", "").unwrap();
    registrar
        .mark_attendance("S1", "2024-01-10", Status::Present)
        .unwrap();
    registrar
        .mark_attendance("S1", "2024-01-11", Status::Absent)
        .unwrap();
    registrar
        .mark_attendance("S1", "2024-01-12", Status::Late)
        .unwrap();

    let mut output = Vec::new();
    encode(&registrar, &mut output).unwrap();

    let expected = "\
ID,Name,Program,Date,Status
S1,Ada Lovelace,,2024-01-10,Present
S1,Ada Lovelace,,2024-01-11,Absent
S1,Ada Lovelace,,2024-01-12,Late
";
    assert_eq!(output, expected.as_bytes());
}

#[test]
fn embedded_commas_are_quoted() {
    let mut registrar = Registrar::new();
    registrar
        .register("S1", "Lovelace, Ada", "Maths, Applied")
        .unwrap();

    let mut output = Vec::new();
    encode(&registrar, &mut output).unwrap();
    assert_eq!(
        output,
        b"ID,Name,Program,Date,Status\nS1,\"Lovelace, Ada\",\"Maths, Applied\",None,None\n"
    );

    let decoded = decode(output.as_slice()).unwrap();
    let student = decoded.find("S1").unwrap();
    assert_eq!(student.name(), "Lovelace, Ada");
    assert_eq!(student.program(), "Maths, Applied");
}
