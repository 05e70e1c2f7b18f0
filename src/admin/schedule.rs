use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    format::{day_name, format_time, format_time_for_input},
    models::{StaffMember, StaffSchedule},
};

pub const DEFAULT_START: &str = "09:00";
pub const DEFAULT_END: &str = "17:00";
pub const DEFAULT_BREAK_START: &str = "13:00";
pub const DEFAULT_BREAK_END: &str = "14:00";
pub const DEFAULT_DURATION: u32 = 30;
pub const DEFAULT_MAX_APPOINTMENTS: u32 = 8;

/// What one weekday cell of the week view shows.
#[derive(Debug, Clone, PartialEq)]
pub enum DaySlot {
    NotConfigured,
    NotAvailable,
    Available {
        range: String,
        break_range: Option<String>,
        duration: u32,
        max_appointments: u32,
    },
}

impl DaySlot {
    pub fn from_schedule(schedule: Option<&StaffSchedule>) -> Self {
        let Some(schedule) = schedule else {
            return DaySlot::NotConfigured;
        };
        if !schedule.is_available {
            return DaySlot::NotAvailable;
        }
        DaySlot::Available {
            range: format!(
                "{} - {}",
                format_time(schedule.start_time.as_deref().unwrap_or_default()),
                format_time(schedule.end_time.as_deref().unwrap_or_default())
            ),
            break_range: schedule
                .break_window()
                .map(|(start, end)| format!("{} - {}", format_time(start), format_time(end))),
            duration: schedule.appointment_duration.unwrap_or(DEFAULT_DURATION),
            max_appointments: schedule.max_appointments.unwrap_or(DEFAULT_MAX_APPOINTMENTS),
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            DaySlot::NotConfigured => "schedule-not-configured",
            DaySlot::NotAvailable => "schedule-not-available",
            DaySlot::Available { .. } => "schedule-available",
        }
    }

    pub fn lines(&self) -> Vec<String> {
        match self {
            DaySlot::NotConfigured => vec!["Horario no configurado".to_string()],
            DaySlot::NotAvailable => vec!["No disponible".to_string()],
            DaySlot::Available {
                range,
                break_range,
                duration,
                max_appointments,
            } => {
                let mut lines = vec![range.clone()];
                if let Some(break_range) = break_range {
                    lines.push(format!("Descanso: {break_range}"));
                }
                lines.push(format!("Citas: {duration} min (máx: {max_appointments})"));
                lines
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DayView {
    pub day_of_week: u8,
    pub name: &'static str,
    pub slot: DaySlot,
}

/// Monday through Sunday, with unconfigured days included.
pub fn week_view(schedules: &BTreeMap<u8, StaffSchedule>) -> Vec<DayView> {
    (0..7u8)
        .map(|day| DayView {
            day_of_week: day,
            name: day_name(day),
            slot: DaySlot::from_schedule(schedules.get(&day)),
        })
        .collect()
}

/// Contents of the day editor modal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScheduleDayForm {
    pub staff_id: i64,
    pub day_of_week: u8,
    #[serde(default)]
    pub schedule_id: Option<String>,
    #[serde(default)]
    pub is_available: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub has_break: Option<String>,
    #[serde(default)]
    pub break_start: String,
    #[serde(default)]
    pub break_end: String,
    #[serde(default)]
    pub appointment_duration: String,
    #[serde(default)]
    pub max_appointments: String,
}

impl ScheduleDayForm {
    /// Defaults for an unconfigured day, or the stored values when one exists.
    pub fn for_day(staff_id: i64, day_of_week: u8, existing: Option<&StaffSchedule>) -> Self {
        let mut form = Self {
            staff_id,
            day_of_week,
            schedule_id: None,
            is_available: "true".to_string(),
            start_time: DEFAULT_START.to_string(),
            end_time: DEFAULT_END.to_string(),
            has_break: None,
            break_start: DEFAULT_BREAK_START.to_string(),
            break_end: DEFAULT_BREAK_END.to_string(),
            appointment_duration: DEFAULT_DURATION.to_string(),
            max_appointments: DEFAULT_MAX_APPOINTMENTS.to_string(),
        };

        if let Some(schedule) = existing {
            form.schedule_id = schedule.id.map(|id| id.to_string());
            form.is_available = schedule.is_available.to_string();
            form.start_time = format_time_for_input(schedule.start_time.as_deref().unwrap_or_default());
            form.end_time = format_time_for_input(schedule.end_time.as_deref().unwrap_or_default());
            if let Some((start, end)) = schedule.break_window() {
                form.has_break = Some("on".to_string());
                form.break_start = format_time_for_input(start);
                form.break_end = format_time_for_input(end);
            }
            if let Some(duration) = schedule.appointment_duration {
                form.appointment_duration = duration.to_string();
            }
            if let Some(max) = schedule.max_appointments {
                form.max_appointments = max.to_string();
            }
        }

        form
    }

    pub fn title(&self) -> String {
        format!("Editar Horario - {}", day_name(self.day_of_week))
    }

    pub fn available(&self) -> bool {
        self.is_available == "true"
    }

    pub fn has_break(&self) -> bool {
        self.has_break.as_deref().is_some_and(|value| !value.is_empty())
    }

    pub fn schedule_id(&self) -> Option<i64> {
        self.schedule_id.as_deref().and_then(|id| id.trim().parse().ok())
    }

    /// Time fields are only sent for available days; the break pair goes out as
    /// nulls when the break box is unchecked.
    pub fn payload(&self) -> SchedulePayload {
        let times = self.available().then(|| {
            let (break_start, break_end) = if self.has_break() {
                (Some(self.break_start.clone()), Some(self.break_end.clone()))
            } else {
                (None, None)
            };
            SlotTimes {
                start_time: self.start_time.clone(),
                end_time: self.end_time.clone(),
                appointment_duration: self.appointment_duration.trim().parse().ok(),
                max_appointments: self.max_appointments.trim().parse().ok(),
                break_start,
                break_end,
            }
        });

        SchedulePayload {
            staff_id: self.staff_id,
            day_of_week: self.day_of_week,
            is_available: self.available(),
            times,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulePayload {
    pub staff_id: i64,
    pub day_of_week: u8,
    pub is_available: bool,
    #[serde(flatten)]
    pub times: Option<SlotTimes>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotTimes {
    pub start_time: String,
    pub end_time: String,
    pub appointment_duration: Option<u32>,
    pub max_appointments: Option<u32>,
    pub break_start: Option<String>,
    pub break_end: Option<String>,
}

/// Where a copied week goes: named staff members or everyone holding a role.
#[derive(Debug, Clone, PartialEq)]
pub enum CopyTarget {
    Staff(Vec<i64>),
    Role(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyScheduleRequest {
    pub source_staff_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_staff_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_role: Option<String>,
}

impl CopyScheduleRequest {
    /// Rejects empty targets with the message the user sees.
    pub fn new(source_staff_id: i64, target: CopyTarget) -> Result<Self, &'static str> {
        match target {
            CopyTarget::Staff(ids) if ids.is_empty() => {
                Err("Por favor seleccione al menos un miembro del personal")
            }
            CopyTarget::Staff(ids) => Ok(Self {
                source_staff_id,
                target_staff_ids: Some(ids),
                target_role: None,
            }),
            CopyTarget::Role(role) if role.trim().is_empty() => Err("Por favor seleccione un rol"),
            CopyTarget::Role(role) => Ok(Self {
                source_staff_id,
                target_staff_ids: None,
                target_role: Some(role.trim().to_string()),
            }),
        }
    }
}

/// Contents of the copy-schedule modal.
#[derive(Debug, Clone)]
pub struct CopyScheduleForm {
    pub source_staff_id: i64,
    pub source_name: String,
    pub targets: Vec<StaffMember>,
}

impl CopyScheduleForm {
    pub fn new(source_staff_id: i64, source_name: String, active_staff: Vec<StaffMember>) -> Self {
        let targets = active_staff
            .into_iter()
            .filter(|member| member.id != source_staff_id)
            .collect();
        Self {
            source_staff_id,
            source_name,
            targets,
        }
    }
}
