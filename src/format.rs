//! Presentation helpers shared by the views and the askama filters.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

const DAYS: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

pub const NOT_AVAILABLE: &str = "N/A";

/// `"13:05"` → `"1:05 PM"`. Seconds are dropped; values without a colon pass through.
pub fn format_time(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    let Some((hours, rest)) = value.split_once(':') else {
        return value.to_string();
    };
    let minutes = rest.split(':').next().unwrap_or_default();
    let Some(hour) = leading_number(hours) else {
        return value.to_string();
    };

    let suffix = if hour >= 12 { "PM" } else { "AM" };
    let hour12 = match hour % 12 {
        0 => 12,
        other => other,
    };
    format!("{hour12}:{minutes} {suffix}")
}

/// Normalizes `H:M[:S]` to the `HH:MM` shape time inputs expect.
pub fn format_time_for_input(value: &str) -> String {
    let value = value.trim();
    let mut parts = value.split(':');
    match (parts.next(), parts.next()) {
        (Some(hours), Some(minutes)) => format!("{hours:0>2}:{minutes:0>2}"),
        _ => value.to_string(),
    }
}

/// `dd/mm/yyyy`; unparseable input is shown as received.
pub fn format_date(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    match parse_date(value) {
        Some(date) => date.format("%d/%m/%Y").to_string(),
        None => value.to_string(),
    }
}

/// `15 de marzo de 2024`.
pub fn format_date_long(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    match parse_date(value) {
        Some(date) => format!(
            "{} de {} de {}",
            date.day(),
            MONTHS[date.month0() as usize],
            date.year()
        ),
        None => value.to_string(),
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(datetime.date());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(datetime.date());
    }
    // Flask's default JSON encoding of datetimes.
    if let Ok(datetime) = DateTime::parse_from_rfc2822(&value.replace("GMT", "+0000")) {
        return Some(datetime.date_naive());
    }
    None
}

pub fn day_name(day_of_week: u8) -> &'static str {
    DAYS.get(day_of_week as usize).copied().unwrap_or("Desconocido")
}

pub fn translate_role(role: &str) -> String {
    match role {
        "admin" => "Administrador",
        "veterinarian" => "Veterinario",
        "receptionist" => "Recepcionista",
        "assistant" => "Auxiliar",
        "client" => "Cliente",
        other => other,
    }
    .to_string()
}

pub fn translate_status(status: &str) -> String {
    match status {
        "scheduled" => "Programada",
        "completed" => "Completada",
        "cancelled" => "Cancelada",
        "no-show" => "No asistió",
        other => other,
    }
    .to_string()
}

pub fn pet_species_icon(species: &str) -> &'static str {
    match species.trim().to_lowercase().as_str() {
        "perro" | "perros" | "dog" | "dogs" => "🐕",
        "gato" | "gatos" | "cat" | "cats" => "🐈",
        "ave" | "aves" | "bird" | "birds" => "🐦",
        "pez" | "peces" | "fish" => "🐠",
        "conejo" | "conejos" | "rabbit" | "rabbits" => "🐇",
        "reptil" | "reptiles" | "reptile" => "🦎",
        "hamster" | "hamsters" => "🐹",
        _ => "🐾",
    }
}

/// Mirrors `parseInt`: reads leading digits and ignores the rest.
pub fn leading_number(value: &str) -> Option<u32> {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Mirrors `parseFloat` for unsigned decimals: `"4.5kg"` → `4.5`.
pub fn leading_decimal(value: &str) -> Option<f64> {
    let mut seen_dot = false;
    let number: String = value
        .trim_start()
        .chars()
        .take_while(|ch| {
            if *ch == '.' && !seen_dot {
                seen_dot = true;
                return true;
            }
            ch.is_ascii_digit()
        })
        .collect();
    number.parse().ok()
}
