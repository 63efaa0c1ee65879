//! Finance request records, the draft builder, and submit validation
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::registry::RequestStatus;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    #[n(0)]
    Purchase,
    #[n(1)]
    Payment,
    #[n(2)]
    PettyCash,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestType::Purchase => "purchase",
            RequestType::Payment => "payment",
            RequestType::PettyCash => "pettycash",
        };
        f.write_str(name)
    }
}

/// Decimal money amount. Encoded as its canonical string form so the stored
/// bytes survive scale/precision changes in the decimal crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Whole units, e.g. `Amount::from_major(1500)` for 1500.00.
    pub fn from_major(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub url: String,
}

/// A reimbursement/purchase/petty-cash request. `status` is the only field
/// the transition engine mutates on approval actions; `revision` is the
/// compare-and-swap token the store checks on every persisted transition.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct FinanceRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub request_type: RequestType,
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub category_type: String,
    #[n(5)]
    pub amount_estimated: Option<Amount>,
    #[n(6)]
    pub amount_actual: Option<Amount>,
    #[n(7)]
    pub applicant_id: String,
    #[n(8)]
    pub applicant_name: String,
    #[n(9)]
    pub applicant_email: String,
    #[n(10)]
    pub applicant_department: String,
    #[n(11)]
    pub related_purchase_id: Option<String>,
    #[n(12)]
    pub no_purchase_reason: Option<String>,
    #[n(13)]
    pub attachments: Vec<Attachment>,
    #[n(14)]
    pub status: RequestStatus,
    #[n(15)]
    pub revision: u64,
    #[n(16)]
    pub created_at: TimeStamp<Utc>,
    #[n(17)]
    pub updated_at: TimeStamp<Utc>,
}

impl FinanceRequest {
    /// The amount the workflow cares about for this request's type.
    pub fn authoritative_amount(&self) -> Option<Amount> {
        match self.request_type {
            RequestType::Purchase => self.amount_estimated,
            RequestType::Payment | RequestType::PettyCash => self.amount_actual,
        }
    }

    /// Submit preconditions. Checked before any `draft/returned -> pending_lead`
    /// transition; a failure leaves the request untouched.
    pub fn validate_for_submit(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingDescription);
        }
        if self.category_type.trim().is_empty() {
            return Err(ValidationError::MissingCategory);
        }
        if self.applicant_department.trim().is_empty() {
            return Err(ValidationError::MissingDepartment);
        }
        match self.authoritative_amount() {
            Some(amount) if amount.is_positive() => {}
            _ => return Err(ValidationError::NonPositiveAmount),
        }
        if self.request_type == RequestType::Payment
            && self.related_purchase_id.is_none()
            && self.no_purchase_reason.is_none()
        {
            return Err(ValidationError::MissingPaymentLink);
        }

        Ok(())
    }
}

/// Chained-setter draft for creating a request or editing one that the
/// applicant still owns (`draft`/`returned`). Unset fields keep their
/// current value on edit.
#[derive(Debug, Default, Clone)]
pub struct RequestDraft {
    pub(crate) request_type: Option<RequestType>,
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) category_type: Option<String>,
    pub(crate) amount_estimated: Option<Amount>,
    pub(crate) amount_actual: Option<Amount>,
    pub(crate) department: Option<String>,
    pub(crate) related_purchase_id: Option<String>,
    pub(crate) no_purchase_reason: Option<String>,
    pub(crate) attachments: Vec<Attachment>,
}

impl RequestDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_type(mut self, request_type: RequestType) -> Self {
        self.request_type = Some(request_type);
        self
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
    pub fn set_category(mut self, category_type: &str) -> Self {
        self.category_type = Some(category_type.to_string());
        self
    }
    pub fn set_amount_estimated(mut self, amount: Amount) -> Self {
        self.amount_estimated = Some(amount);
        self
    }
    pub fn set_amount_actual(mut self, amount: Amount) -> Self {
        self.amount_actual = Some(amount);
        self
    }
    pub fn set_department(mut self, department: &str) -> Self {
        self.department = Some(department.to_string());
        self
    }
    pub fn set_related_purchase(mut self, purchase_id: &str) -> Self {
        self.related_purchase_id = Some(purchase_id.to_string());
        self
    }
    pub fn set_no_purchase_reason(mut self, reason: &str) -> Self {
        self.no_purchase_reason = Some(reason.to_string());
        self
    }
    pub fn add_attachment(mut self, name: &str, url: &str) -> Self {
        self.attachments.push(Attachment {
            name: name.to_string(),
            url: url.to_string(),
        });
        self
    }

    pub fn request_type(&self) -> Option<RequestType> {
        self.request_type
    }

    /// Materialise a brand-new request in `draft` status. The type must be
    /// chosen up front; everything else may stay empty until submit.
    pub fn into_request(
        self,
        id: String,
        applicant_id: &str,
        applicant_name: &str,
        applicant_email: &str,
    ) -> Result<FinanceRequest, ValidationError> {
        let request_type = self.request_type.ok_or(ValidationError::MissingType)?;
        let now = TimeStamp::new();

        Ok(FinanceRequest {
            id,
            request_type,
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            category_type: self.category_type.unwrap_or_default(),
            amount_estimated: self.amount_estimated,
            amount_actual: self.amount_actual,
            applicant_id: applicant_id.to_string(),
            applicant_name: applicant_name.to_string(),
            applicant_email: applicant_email.to_string(),
            applicant_department: self.department.unwrap_or_default(),
            related_purchase_id: self.related_purchase_id,
            no_purchase_reason: self.no_purchase_reason,
            attachments: self.attachments,
            status: RequestStatus::Draft,
            revision: 0,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Apply the set fields onto an existing request. The caller decides
    /// whether a type change is legal for the request's history.
    pub fn apply_to(&self, request: &mut FinanceRequest) {
        if let Some(request_type) = self.request_type {
            request.request_type = request_type;
        }
        if let Some(title) = &self.title {
            request.title = title.clone();
        }
        if let Some(description) = &self.description {
            request.description = description.clone();
        }
        if let Some(category_type) = &self.category_type {
            request.category_type = category_type.clone();
        }
        if let Some(amount) = self.amount_estimated {
            request.amount_estimated = Some(amount);
        }
        if let Some(amount) = self.amount_actual {
            request.amount_actual = Some(amount);
        }
        if let Some(department) = &self.department {
            request.applicant_department = department.clone();
        }
        if let Some(purchase_id) = &self.related_purchase_id {
            request.related_purchase_id = Some(purchase_id.clone());
        }
        if let Some(reason) = &self.no_purchase_reason {
            request.no_purchase_reason = Some(reason.clone());
        }
        if !self.attachments.is_empty() {
            request.attachments = self.attachments.clone();
        }
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl<C> minicbor::Encode<C> for Amount {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0.to_string())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Amount {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let raw = d.str()?;

        Decimal::from_str(raw)
            .map(Amount)
            .map_err(|_| minicbor::decode::Error::message("failed to parse decimal amount"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn amount_encoding() {
        let original = Amount::new(Decimal::new(123_456, 2));

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: Amount = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn draft_requires_a_type() {
        let err = RequestDraft::new()
            .set_title("projector bulbs")
            .into_request("req_x".into(), "user_a", "Ada", "ada@example.org")
            .unwrap_err();

        assert_eq!(err, ValidationError::MissingType);
    }
}
