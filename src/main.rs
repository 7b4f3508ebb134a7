use log::error;
use std::process;
use std::str::FromStr;

use registrar::{load, save, Registrar, RegistrarError, Status, Student};

const USAGE: &str = "usage: attendance <file> <command> [args]
commands:
  add <id> <name> [program]    register a new student
  mark <id> <date> <status>    mark Present, Absent or Late for a date
  list                         list all students
  show <id>                    show one student's details and history
  report                       per-student percentages and class average";

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    let path = &args[1];
    let mut registrar = match load(path) {
        Ok(registrar) => registrar,
        Err(err) => {
            error!("could not load '{}': {}", path, err);
            process::exit(1);
        }
    };

    if let Err(err) = run(&mut registrar, path, &args[2], &args[3..]) {
        error!("{}", err);
        process::exit(1);
    }
}

fn run(
    registrar: &mut Registrar,
    path: &str,
    command: &str,
    args: &[String],
) -> Result<(), RegistrarError> {
    match (command, args) {
        ("add", [id, name, rest @ ..]) => {
            let program = rest.first().map(String::as_str).unwrap_or("");
            registrar.register(id, name, program)?;
            save(registrar, path)?;
            println!("Registered {} ({})", name, id);
        }
        ("mark", [id, date, status]) => {
            let status = Status::from_str(status)?;
            registrar.mark_attendance(id, date, status)?;
            save(registrar, path)?;
            println!("Marked {} as {} on {}", id, status, date);
        }
        ("list", []) => list(registrar),
        ("show", [id]) => show(registrar, id)?,
        ("report", []) => report(registrar),
        _ => {
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    }
    Ok(())
}

fn program_label(student: &Student) -> &str {
    if student.program().is_empty() {
        "N/A"
    } else {
        student.program()
    }
}

fn list(registrar: &Registrar) {
    if registrar.students().is_empty() {
        println!("No students registered.");
        return;
    }
    println!("{:<20} {:<30} {:<20}", "Student ID", "Name", "Program");
    for student in registrar.students() {
        println!(
            "{:<20} {:<30} {:<20}",
            student.id(),
            student.name(),
            program_label(student)
        );
    }
}

fn show(registrar: &Registrar, id: &str) -> Result<(), RegistrarError> {
    let student = registrar
        .find(id)
        .ok_or_else(|| RegistrarError::StudentNotFound(id.to_string()))?;

    println!("Name:    {}", student.name());
    println!("ID:      {}", student.id());
    println!("Program: {}", program_label(student));

    let stats = student.stats();
    if stats.total() == 0 {
        println!("No attendance records.");
        return Ok(());
    }

    println!("Total classes: {}", stats.total());
    println!("Present: {}", stats.present);
    println!("Late:    {}", stats.late);
    println!("Absent:  {}", stats.absent);
    println!("Attendance: {:.2}%", stats.percentage());
    println!();
    println!("{:<15} {:<10}", "Date", "Status");
    for record in student.history() {
        println!("{:<15} {:<10}", record.date, record.status);
    }
    Ok(())
}

fn report(registrar: &Registrar) {
    if registrar.students().is_empty() {
        println!("No students registered.");
        return;
    }
    println!("{:<20} {:<30} {:<15}", "Student ID", "Name", "Attendance %");
    for student in registrar.students() {
        println!(
            "{:<20} {:<30} {:.2}%",
            student.id(),
            student.name(),
            student.stats().percentage()
        );
    }
    println!();
    println!("Average class attendance: {:.2}%", registrar.class_average());
}
