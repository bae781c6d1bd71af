use chrono::{Duration, NaiveDate};
use montaz_api::models::{
    check_date_ordering,
    role::{join_services, parse_services},
    Capability, InstallationStatus, ServiceType, TimeSlot, TransportStatus,
};
use proptest::prelude::*;
use strum::IntoEnumIterator;

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..3650).prop_map(|days| NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(days))
}

fn any_service() -> impl Strategy<Value = ServiceType> {
    prop_oneof![
        Just(ServiceType::DoorInstallation),
        Just(ServiceType::FlooringInstallation)
    ]
}

fn any_capabilities() -> impl Strategy<Value = Vec<Capability>> {
    proptest::sample::subsequence(
        vec![
            Capability::DoorInstallation,
            Capability::FlooringInstallation,
            Capability::Transport,
        ],
        0..=3,
    )
}

/// Re-cases and swaps separators the way hand-typed statuses arrive.
fn scramble(value: &str, upper: bool, dash: bool) -> String {
    let value = if upper {
        value.to_uppercase()
    } else {
        value.to_string()
    };
    let value = if dash { value.replace('_', "-") } else { value };
    format!("  {} ", value)
}

proptest! {
    #[test]
    fn installation_never_precedes_the_minimum_gap(
        service in any_service(),
        transport in any_date(),
        offset in -10i64..10,
    ) {
        let installation = transport + Duration::days(offset);
        let accepted = check_date_ordering(service, Some(transport), Some(installation)).is_ok();
        prop_assert_eq!(accepted, offset >= service.min_days_after_transport());
    }

    #[test]
    fn a_missing_date_never_violates_ordering(service in any_service(), date in any_date()) {
        prop_assert!(check_date_ordering(service, Some(date), None).is_ok());
        prop_assert!(check_date_ordering(service, None, Some(date)).is_ok());
    }

    #[test]
    fn installation_statuses_survive_scrambling(upper in any::<bool>(), dash in any::<bool>()) {
        for status in InstallationStatus::iter() {
            let raw = scramble(status.as_str(), upper, dash);
            prop_assert_eq!(InstallationStatus::normalize(&raw).unwrap(), status);
        }
    }

    #[test]
    fn transport_statuses_survive_scrambling(upper in any::<bool>(), dash in any::<bool>()) {
        for status in TransportStatus::iter() {
            let raw = scramble(status.as_str(), upper, dash);
            prop_assert_eq!(TransportStatus::normalize(&raw).unwrap(), status);
        }
    }

    #[test]
    fn unknown_statuses_are_rejected(raw in "[a-z]{3,12}") {
        let aliases = [
            "new", "nowe", "nowy", "nowa", "scheduled", "inprogress", "completed", "done",
            "complaint", "reklamacja",
        ];
        prop_assume!(!aliases.contains(&raw.as_str()));
        prop_assume!(!raw.starts_with("zaplanowan") && !raw.starts_with("zakon") && !raw.starts_with("zrealiz"));
        prop_assert!(InstallationStatus::normalize(&raw).is_err(), "{} unexpectedly accepted", raw);
    }

    #[test]
    fn services_column_keeps_order(services in any_capabilities()) {
        let stored = join_services(&services);
        prop_assert_eq!(parse_services(Some(&stored)), services);
    }

    #[test]
    fn time_slots_accept_clock_notation(slot in proptest::sample::select(TimeSlot::iter().collect::<Vec<_>>())) {
        let (from, to) = slot.as_str().split_once('-').unwrap();
        let clock = format!("{}:00-{}:00", from, to);
        prop_assert_eq!(clock.parse::<TimeSlot>().unwrap(), slot);
        let short = format!("{}-{}", from.trim_start_matches('0'), to);
        prop_assert_eq!(short.parse::<TimeSlot>().unwrap(), slot);
    }
}
