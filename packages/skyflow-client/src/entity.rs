//! Entity vocabulary recognised by the detect service.
//!
//! Entity tags are lowercase and matched case-sensitively. Unknown tags are
//! rejected here, before any request reaches the vault.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkyflowError};

macro_rules! entity_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Category of sensitive data the detect service can find.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
        pub enum EntityType {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl EntityType {
            /// Every supported entity type, in vocabulary order.
            pub const ALL: &'static [EntityType] = &[$(EntityType::$variant),+];

            /// The wire tag for this entity type.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(EntityType::$variant => $name,)+
                }
            }

            fn lookup(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(EntityType::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

entity_types! {
    AccountNumber => "account_number",
    Age => "age",
    All => "all",
    BankAccount => "bank_account",
    BloodType => "blood_type",
    Condition => "condition",
    CorporateAction => "corporate_action",
    CreditCard => "credit_card",
    CreditCardExpiration => "credit_card_expiration",
    Cvv => "cvv",
    Date => "date",
    DateInterval => "date_interval",
    Dob => "dob",
    Dose => "dose",
    DriverLicense => "driver_license",
    Drug => "drug",
    Duration => "duration",
    Effect => "effect",
    EmailAddress => "email_address",
    Event => "event",
    Filename => "filename",
    FinancialMetric => "financial_metric",
    GenderSexuality => "gender_sexuality",
    HealthcareNumber => "healthcare_number",
    Injury => "injury",
    IpAddress => "ip_address",
    Language => "language",
    Location => "location",
    LocationAddress => "location_address",
    LocationAddressStreet => "location_address_street",
    LocationCity => "location_city",
    LocationCoordinate => "location_coordinate",
    LocationCountry => "location_country",
    LocationState => "location_state",
    LocationZip => "location_zip",
    MaritalStatus => "marital_status",
    MedicalCode => "medical_code",
    MedicalProcess => "medical_process",
    Money => "money",
    Name => "name",
    NameFamily => "name_family",
    NameGiven => "name_given",
    NameMedicalProfessional => "name_medical_professional",
    NumericalPii => "numerical_pii",
    Occupation => "occupation",
    Organization => "organization",
    OrganizationMedicalFacility => "organization_medical_facility",
    Origin => "origin",
    PassportNumber => "passport_number",
    Password => "password",
    PhoneNumber => "phone_number",
    PhysicalAttribute => "physical_attribute",
    PoliticalAffiliation => "political_affiliation",
    Project => "project",
    Religion => "religion",
    RoutingNumber => "routing_number",
    Ssn => "ssn",
    Statistics => "statistics",
    Time => "time",
    Trend => "trend",
    Url => "url",
    Username => "username",
    VehicleId => "vehicle_id",
    ZodiacSign => "zodiac_sign",
}

/// Check whether `name` is a supported entity tag.
pub fn is_valid_entity(name: &str) -> bool {
    EntityType::lookup(name).is_some()
}

/// Resolve an entity tag, failing with [`SkyflowError::InvalidEntity`] for unknown names.
pub fn resolve_entity(name: &str) -> Result<EntityType> {
    EntityType::lookup(name).ok_or_else(|| SkyflowError::InvalidEntity {
        entity: name.to_string(),
    })
}

/// Resolve a list of entity tags, stopping at the first unknown one.
pub fn resolve_entities<I, S>(names: I) -> Result<Vec<EntityType>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| resolve_entity(name.as_ref()))
        .collect()
}

impl FromStr for EntityType {
    type Err = SkyflowError;

    fn from_str(s: &str) -> Result<Self> {
        resolve_entity(s)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_is_case_sensitive() {
        assert!(is_valid_entity("email_address"));
        assert!(is_valid_entity("ssn"));
        assert!(!is_valid_entity("EMAIL_ADDRESS"));
        assert!(!is_valid_entity("Email_Address"));
        assert!(!is_valid_entity(""));
    }

    #[test]
    fn test_resolve_unknown_names_entity() {
        let err = resolve_entity("bogus").unwrap_err();
        assert!(err.to_string().contains("bogus"));
        assert_eq!(err.code(), "INVALID_ENTITY_ERROR");
    }

    #[test]
    fn test_resolve_entities_stops_at_first_unknown() {
        let err = resolve_entities(["ssn", "nope", "also_nope"]).unwrap_err();
        match err {
            SkyflowError::InvalidEntity { entity } => assert_eq!(entity, "nope"),
            other => panic!("unexpected error: {other:?}"),
        }

        let ok = resolve_entities(["ssn", "email_address"]).unwrap();
        assert_eq!(ok, vec![EntityType::Ssn, EntityType::EmailAddress]);
    }

    #[test]
    fn test_vocabulary_round_trips_through_tags() {
        for entity in EntityType::ALL {
            assert_eq!(resolve_entity(entity.as_str()).unwrap(), *entity);
        }
    }

    #[test]
    fn test_serde_uses_wire_tags() {
        let json = serde_json::to_string(&EntityType::PhoneNumber).unwrap();
        assert_eq!(json, "\"phone_number\"");

        let parsed: EntityType = serde_json::from_str("\"credit_card\"").unwrap();
        assert_eq!(parsed, EntityType::CreditCard);
    }
}
