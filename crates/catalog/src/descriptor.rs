use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use classorder_core::{ClassId, Money};

/// How learners join a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentType {
    /// Fixed cohort with a course start date.
    Scheduled,
    /// Rolling enrollment; learners start whenever they like.
    Ongoing,
}

impl fmt::Display for EnrollmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentType::Scheduled => f.write_str("scheduled"),
            EnrollmentType::Ongoing => f.write_str("ongoing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequirements {
    pub min_scenarios: u32,
    pub min_passing_score: u32,
    pub require_all_scenarios: bool,
}

/// Catalog view of a purchasable class.
///
/// `course_start_date` should be present for scheduled classes, but the engine
/// must cope with it missing (such a class never locks by date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDescriptor {
    pub class_id: ClassId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<Money>,
    pub enrollment_type: EnrollmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participation_period_end: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_requirements: Option<CompletionRequirements>,
}

impl ClassDescriptor {
    pub fn scheduled(class_id: impl Into<ClassId>, price: Money, course_start_date: NaiveDate) -> Self {
        Self {
            class_id: class_id.into(),
            title: None,
            price,
            discount_price: None,
            enrollment_type: EnrollmentType::Scheduled,
            course_start_date: Some(course_start_date),
            participation_period_end: None,
            completion_requirements: None,
        }
    }

    pub fn ongoing(class_id: impl Into<ClassId>, price: Money) -> Self {
        Self {
            class_id: class_id.into(),
            title: None,
            price,
            discount_price: None,
            enrollment_type: EnrollmentType::Ongoing,
            course_start_date: None,
            participation_period_end: None,
            completion_requirements: None,
        }
    }

    pub fn with_discount_price(mut self, discount_price: Money) -> Self {
        self.discount_price = Some(discount_price);
        self
    }

    pub fn with_participation_period_end(mut self, end: NaiveDate) -> Self {
        self.participation_period_end = Some(end);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The price a buyer pays today: the discount price when one is set.
    pub fn effective_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }
}
