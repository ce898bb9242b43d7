//! Shared harness for the behaviour suites.
//!
//! Each suite drives the domain services over the in-memory stores on a
//! dedicated current-thread runtime, with time controlled by a mutable clock.

#![allow(dead_code, reason = "each suite uses a different subset of the harness")]

use std::sync::Arc;

use chrono::NaiveDate;
use mockable::Clock;
use mutuelle_sync::domain::{
    AccountId, DoctorId, DoctorProfile, InsurerId, InsurerProfile, MemberId, MemberProfile,
    PharmacistId, PharmacistProfile, PrescriptionPayload, RoleProfile,
};
use mutuelle_sync::outbound::memory::MemoryStores;
use mutuelle_sync::test_support::runtime::MutableClock;
use tokio::runtime::Runtime;

/// Runtime, clock and stores shared by one scenario.
pub struct Harness {
    runtime: Runtime,
    pub clock: Arc<MutableClock>,
    pub stores: MemoryStores,
}

impl Harness {
    /// Fresh stores with the clock at noon on the given day.
    pub fn at(year: i32, month: u32, day: u32) -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build scenario runtime");
        Self {
            runtime,
            clock: Arc::new(MutableClock::at_noon(year, month, day)),
            stores: MemoryStores::new(),
        }
    }

    /// Run `future` to completion on the scenario runtime.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn add_member(&self) -> MemberProfile {
        let member = MemberProfile {
            id: MemberId::random(),
            account_id: AccountId::random(),
        };
        self.add(RoleProfile::Member(member.clone()));
        member
    }

    pub fn add_doctor(&self) -> DoctorProfile {
        let doctor = DoctorProfile {
            id: DoctorId::random(),
            account_id: AccountId::random(),
        };
        self.add(RoleProfile::Doctor(doctor.clone()));
        doctor
    }

    pub fn add_insurer(&self) -> InsurerProfile {
        let insurer = InsurerProfile {
            id: InsurerId::random(),
            account_id: AccountId::random(),
        };
        self.add(RoleProfile::Insurer(insurer.clone()));
        insurer
    }

    pub fn add_pharmacist(&self, active: bool) -> PharmacistProfile {
        let pharmacist = PharmacistProfile {
            id: PharmacistId::random(),
            account_id: AccountId::random(),
            active,
            activated_at: active.then(|| self.clock.utc()),
        };
        self.add(RoleProfile::Pharmacist(pharmacist.clone()));
        pharmacist
    }

    pub fn add(&self, profile: RoleProfile) {
        self.stores.roles.add(profile).expect("store role profile");
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Medication order written on `day`, valid for a month.
pub fn payload(day: NaiveDate) -> PrescriptionPayload {
    PrescriptionPayload {
        kind: Default::default(),
        diagnosis: "Paludisme simple".to_owned(),
        medications: "Artemether-lumefantrine 20/120".to_owned(),
        dosage: "4 comprimés deux fois par jour".to_owned(),
        treatment_days: 3,
        prescribed_on: day,
        expires_on: day + chrono::Days::new(30),
        urgent: false,
        sharing_scope: Default::default(),
    }
}
