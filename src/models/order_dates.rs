use super::service_type::ServiceType;
use chrono::{Duration, NaiveDate};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "installation date {installation} must be on or after {earliest} for {service} (transport on {transport})"
)]
pub struct DateOrderingViolation {
    pub service: ServiceType,
    pub transport: NaiveDate,
    pub installation: NaiveDate,
    pub earliest: NaiveDate,
}

/// Earliest installation date allowed after a delivery on `transport`.
pub fn earliest_installation(service: ServiceType, transport: NaiveDate) -> NaiveDate {
    transport + Duration::days(service.min_days_after_transport())
}

/// Checks the delivery/installation ordering. Holds trivially unless both dates are set.
pub fn check_date_ordering(
    service: ServiceType,
    transport: Option<NaiveDate>,
    installation: Option<NaiveDate>,
) -> Result<(), DateOrderingViolation> {
    let (Some(transport), Some(installation)) = (transport, installation) else {
        return Ok(());
    };

    let earliest = earliest_installation(service, transport);
    if installation < earliest {
        return Err(DateOrderingViolation {
            service,
            transport,
            installation,
            earliest,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn door_install_before_delivery_is_rejected() {
        let transport = Some(d(2025, 4, 20));
        assert!(check_date_ordering(ServiceType::DoorInstallation, transport, Some(d(2025, 4, 18))).is_err());
        assert!(check_date_ordering(ServiceType::DoorInstallation, transport, Some(d(2025, 4, 20))).is_ok());
        assert!(check_date_ordering(ServiceType::DoorInstallation, transport, Some(d(2025, 4, 22))).is_ok());
    }

    #[test]
    fn flooring_needs_two_day_gap() {
        let transport = Some(d(2025, 4, 20));
        let err = check_date_ordering(
            ServiceType::FlooringInstallation,
            transport,
            Some(d(2025, 4, 21)),
        )
        .unwrap_err();
        assert_eq!(err.earliest, d(2025, 4, 22));
        assert!(check_date_ordering(
            ServiceType::FlooringInstallation,
            transport,
            Some(d(2025, 4, 22))
        )
        .is_ok());
    }

    #[test]
    fn missing_dates_never_violate() {
        assert!(check_date_ordering(ServiceType::FlooringInstallation, None, Some(d(2025, 1, 1))).is_ok());
        assert!(check_date_ordering(ServiceType::FlooringInstallation, Some(d(2025, 1, 1)), None).is_ok());
    }

    proptest! {
        #[test]
        fn violation_iff_gap_too_small(offset in -30i64..30, flooring in any::<bool>()) {
            let service = if flooring { ServiceType::FlooringInstallation } else { ServiceType::DoorInstallation };
            let transport = d(2025, 6, 15);
            let installation = transport + Duration::days(offset);
            let result = check_date_ordering(service, Some(transport), Some(installation));
            prop_assert_eq!(result.is_err(), offset < service.min_days_after_transport());
        }
    }
}
