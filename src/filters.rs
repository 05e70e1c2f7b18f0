//! Custom askama filters. Templates reach them as `{{ value|format_time }}`.

use std::fmt::Display;

use crate::format;

pub fn format_time<T: Display>(value: T) -> askama::Result<String> {
    Ok(format::format_time(&value.to_string()))
}

pub fn format_date<T: Display>(value: T) -> askama::Result<String> {
    Ok(format::format_date(&value.to_string()))
}

pub fn format_date_long<T: Display>(value: T) -> askama::Result<String> {
    Ok(format::format_date_long(&value.to_string()))
}

pub fn translate_role<T: Display>(value: T) -> askama::Result<String> {
    Ok(format::translate_role(&value.to_string()))
}

pub fn translate_status<T: Display>(value: T) -> askama::Result<String> {
    Ok(format::translate_status(&value.to_string()))
}

pub fn species_icon<T: Display>(value: T) -> askama::Result<&'static str> {
    Ok(format::pet_species_icon(&value.to_string()))
}

pub fn day_name<T: Display>(value: T) -> askama::Result<&'static str> {
    let day = value.to_string().parse().unwrap_or(u8::MAX);
    Ok(format::day_name(day))
}
