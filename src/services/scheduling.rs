//! Appointment ledger. Owns the no-double-booking invariant: at most one
//! appointment per (doctor, date, time) slot.

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{info, instrument, warn};
use validator::Validate;

use super::visibility::Scope;
use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::models::appointment::Slot;
use crate::models::{Appointment, AppointmentStatus};

const SLOT_TAKEN: &str = "This doctor already has an appointment at this time.";

const APPOINTMENT_SELECT: &str = "SELECT a.id, a.doctor_id, 'Dr. ' || di.username AS doctor_name, \
     a.patient_id, pi.username AS patient_name, a.appointment_date, a.appointment_time, \
     a.status, a.reason, a.notes, a.created_at, a.updated_at \
     FROM appointments a \
     JOIN doctor_profiles d ON d.id = a.doctor_id \
     JOIN identities di ON di.id = d.identity_id \
     JOIN patient_profiles p ON p.id = a.patient_id \
     JOIN identities pi ON pi.id = p.identity_id";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAppointment {
    pub doctor: i64,
    /// Defaults to the caller's own profile when a patient books.
    pub patient: Option<i64>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Absent fields are left unchanged. Status is not editable here, see
/// [`SchedulingLedger::set_status`].
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AppointmentChanges {
    pub doctor: Option<i64>,
    pub patient: Option<i64>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct SchedulingLedger {
    pool: SqlitePool,
}

impl SchedulingLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Newest slot first.
    pub async fn list(&self, caller: &Caller) -> AppResult<Vec<Appointment>> {
        let scope = Scope::resolve(&self.pool, caller).await?;
        let mut query = QueryBuilder::<Sqlite>::new(APPOINTMENT_SELECT);
        scope.push_filter(&mut query);
        query.push(" ORDER BY a.appointment_date DESC, a.appointment_time DESC, a.id DESC");
        Ok(query
            .build_query_as::<Appointment>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// Appointments outside the caller's scope are reported as missing.
    pub async fn get(&self, caller: &Caller, id: i64) -> AppResult<Appointment> {
        let scope = Scope::resolve(&self.pool, caller).await?;
        self.fetch_scoped(scope, id).await
    }

    #[instrument(skip(self, caller, booking), fields(caller = caller.id, doctor = booking.doctor))]
    pub async fn create(&self, caller: &Caller, booking: NewAppointment) -> AppResult<Appointment> {
        booking.validate()?;
        let scope = Scope::resolve(&self.pool, caller).await?;

        let patient_id = match (booking.patient, scope) {
            (Some(id), _) | (None, Scope::Patient(id)) => id,
            (None, _) => return Err(AppError::invalid("patient", "This field is required.")),
        };
        if !scope.covers(booking.doctor, patient_id) {
            warn!("Booking for someone else rejected");
            return Err(AppError::forbidden(
                "You can only book appointments you take part in.",
            ));
        }
        self.ensure_participants_exist(booking.doctor, patient_id).await?;

        let slot = Slot {
            doctor_id: booking.doctor,
            date: booking.appointment_date,
            time: booking.appointment_time,
        };
        let now = Utc::now();

        self.ensure_slot_free(slot, None).await?;
        // Autocommit write with no snapshot held: a racing writer queues on
        // the busy timeout and then fails the UNIQUE slot constraint.
        let id = sqlx::query(
            "INSERT INTO appointments (
                doctor_id, patient_id, appointment_date, appointment_time,
                status, reason, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(slot.doctor_id)
        .bind(patient_id)
        .bind(slot.date)
        .bind(slot.time)
        .bind(AppointmentStatus::Pending)
        .bind(&booking.reason)
        .bind(&booking.notes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!(appointment_id = id, "Appointment booked");
        self.fetch_scoped(Scope::All, id).await
    }

    /// Re-checks the slot when doctor, date or time change, ignoring the
    /// appointment being edited.
    #[instrument(skip(self, caller, changes), fields(caller = caller.id))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        changes: AppointmentChanges,
    ) -> AppResult<Appointment> {
        changes.validate()?;
        let scope = Scope::resolve(&self.pool, caller).await?;
        let current = self.fetch_scoped(scope, id).await?;

        let slot = Slot {
            doctor_id: changes.doctor.unwrap_or(current.doctor_id),
            date: changes.appointment_date.unwrap_or(current.appointment_date),
            time: changes.appointment_time.unwrap_or(current.appointment_time),
        };
        let patient_id = changes.patient.unwrap_or(current.patient_id);

        if !scope.covers(slot.doctor_id, patient_id) {
            warn!(appointment_id = id, "Reassignment away from caller rejected");
            return Err(AppError::forbidden(
                "You can only keep appointments you take part in.",
            ));
        }
        if slot.doctor_id != current.doctor_id || patient_id != current.patient_id {
            self.ensure_participants_exist(slot.doctor_id, patient_id).await?;
        }

        if slot != current.slot() {
            self.ensure_slot_free(slot, Some(id)).await?;
        }
        sqlx::query(
            "UPDATE appointments SET
                doctor_id = ?, patient_id = ?, appointment_date = ?, appointment_time = ?,
                reason = COALESCE(?, reason), notes = COALESCE(?, notes), updated_at = ?
             WHERE id = ?",
        )
        .bind(slot.doctor_id)
        .bind(patient_id)
        .bind(slot.date)
        .bind(slot.time)
        .bind(&changes.reason)
        .bind(&changes.notes)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!(appointment_id = id, "Appointment updated");
        self.fetch_scoped(Scope::All, id).await
    }

    /// Overwrite the status. Any status may follow any other; only the
    /// value itself is validated.
    #[instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn set_status(&self, caller: &Caller, id: i64, status: &str) -> AppResult<Appointment> {
        caller.require_admin_or_doctor()?;
        let scope = Scope::resolve(&self.pool, caller).await?;
        let current = self.fetch_scoped(scope, id).await?;
        if !scope.is_admin_or_assigned_doctor(current.doctor_id) {
            return Err(AppError::forbidden(
                "Only an admin or the assigned doctor can change the status.",
            ));
        }

        let status: AppointmentStatus = status
            .parse()
            .map_err(|_| AppError::invalid("status", "Invalid status."))?;

        sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(appointment_id = id, from = %current.status, to = %status, "Appointment status changed");
        self.fetch_scoped(Scope::All, id).await
    }

    #[instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn delete(&self, caller: &Caller, id: i64) -> AppResult<()> {
        let scope = Scope::resolve(&self.pool, caller).await?;
        self.fetch_scoped(scope, id).await?;
        sqlx::query("DELETE FROM appointments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        info!(appointment_id = id, "Appointment deleted");
        Ok(())
    }

    async fn fetch_scoped(&self, scope: Scope, id: i64) -> AppResult<Appointment> {
        let mut query = QueryBuilder::<Sqlite>::new(APPOINTMENT_SELECT);
        scope.push_filter(&mut query);
        query.push(" AND a.id = ").push_bind(id);
        query
            .build_query_as::<Appointment>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Appointment"))
    }

    async fn ensure_participants_exist(&self, doctor_id: i64, patient_id: i64) -> AppResult<()> {
        let doctor: Option<i64> = sqlx::query_scalar("SELECT id FROM doctor_profiles WHERE id = ?")
            .bind(doctor_id)
            .fetch_optional(&self.pool)
            .await?;
        if doctor.is_none() {
            return Err(AppError::invalid(
                "doctor",
                format!("Invalid pk \"{}\" - object does not exist.", doctor_id),
            ));
        }
        let patient: Option<i64> = sqlx::query_scalar("SELECT id FROM patient_profiles WHERE id = ?")
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;
        if patient.is_none() {
            return Err(AppError::invalid(
                "patient",
                format!("Invalid pk \"{}\" - object does not exist.", patient_id),
            ));
        }
        Ok(())
    }

    /// Reject a slot already held by another appointment. A fast path for
    /// the common case; the table's UNIQUE constraint decides any race.
    async fn ensure_slot_free(&self, slot: Slot, exclude: Option<i64>) -> AppResult<()> {
        let holder: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM appointments
             WHERE doctor_id = ? AND appointment_date = ? AND appointment_time = ?
               AND (? IS NULL OR id != ?)",
        )
        .bind(slot.doctor_id)
        .bind(slot.date)
        .bind(slot.time)
        .bind(exclude)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await?;

        match holder {
            Some(holder) => {
                warn!(doctor = slot.doctor_id, %slot.date, %slot.time, holder, "Slot taken");
                Err(AppError::Conflict(SLOT_TAKEN.into()))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::testing::{assert_single_winner, caller_for, date, time, Fixture};

    #[tokio::test]
    async fn second_booking_of_a_slot_conflicts() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let doctor = fx.register("doc", Role::Doctor).await;
        let p1 = fx.register("p1", Role::Patient).await;
        let p2 = fx.register("p2", Role::Patient).await;

        let first = fx.book(&admin, &doctor, &p1, date(2024, 1, 10), time(9, 0)).await;
        assert_eq!(first.status, AppointmentStatus::Pending);

        let booking = NewAppointment {
            doctor: fx.doctor_id(&doctor).await,
            patient: Some(fx.patient_id(&p2).await),
            appointment_date: date(2024, 1, 10),
            appointment_time: time(9, 0),
            reason: None,
            notes: None,
        };
        let err = fx.scheduling.create(&caller_for(&admin), booking).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == SLOT_TAKEN));
    }

    #[tokio::test]
    async fn concurrent_bookings_have_one_winner() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let doctor = fx.register("doc", Role::Doctor).await;
        let p1 = fx.register("p1", Role::Patient).await;
        let p2 = fx.register("p2", Role::Patient).await;
        let caller = caller_for(&admin);
        let doctor_id = fx.doctor_id(&doctor).await;

        let (first_patient, second_patient) = (fx.patient_id(&p1).await, fx.patient_id(&p2).await);
        let booking = |patient: i64| NewAppointment {
            doctor: doctor_id,
            patient: Some(patient),
            appointment_date: date(2024, 3, 1),
            appointment_time: time(14, 30),
            reason: None,
            notes: None,
        };
        let (a, b) = futures::join!(
            fx.scheduling.create(&caller, booking(first_patient)),
            fx.scheduling.create(&caller, booking(second_patient)),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert!(matches!(a.err().or(b.err()), Some(AppError::Conflict(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_bookings_on_separate_connections_leave_one_winner() {
        let (fx, _dir) = Fixture::on_disk().await;
        let admin = caller_for(&fx.register("root", Role::Admin).await);
        let doctor = fx.register("doc", Role::Doctor).await;
        let doctor_id = fx.doctor_id(&doctor).await;
        let mut patients = Vec::new();
        for n in 0..4 {
            let patient = fx.register(&format!("p{}", n), Role::Patient).await;
            patients.push(fx.patient_id(&patient).await);
        }

        let attempts = (0..8).map(|n| {
            let scheduling = fx.scheduling.clone();
            let admin = admin.clone();
            let booking = NewAppointment {
                doctor: doctor_id,
                patient: Some(patients[n % patients.len()]),
                appointment_date: date(2024, 3, 1),
                appointment_time: time(14, 30),
                reason: None,
                notes: None,
            };
            tokio::spawn(async move { scheduling.create(&admin, booking).await })
        });
        let outcomes = futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();
        assert_single_winner(outcomes);

        let booked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appointments")
            .fetch_one(fx.db.pool())
            .await
            .unwrap();
        assert_eq!(booked, 1);
    }

    #[tokio::test]
    async fn store_rejects_duplicate_slot_directly() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let doctor = fx.register("doc", Role::Doctor).await;
        let patient = fx.register("pat", Role::Patient).await;
        let booked = fx.book(&admin, &doctor, &patient, date(2024, 1, 10), time(9, 0)).await;

        let err: AppError = sqlx::query(
            "INSERT INTO appointments (doctor_id, patient_id, appointment_date, appointment_time, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(booked.doctor_id)
        .bind(booked.patient_id)
        .bind(booked.appointment_date)
        .bind(booked.appointment_time)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(fx.db.pool())
        .await
        .unwrap_err()
        .into();
        assert!(matches!(err, AppError::Conflict(ref m) if m == SLOT_TAKEN));
    }

    #[tokio::test]
    async fn same_time_with_another_doctor_is_fine() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let d1 = fx.register("d1", Role::Doctor).await;
        let d2 = fx.register("d2", Role::Doctor).await;
        let patient = fx.register("pat", Role::Patient).await;

        fx.book(&admin, &d1, &patient, date(2024, 1, 10), time(9, 0)).await;
        fx.book(&admin, &d2, &patient, date(2024, 1, 10), time(9, 0)).await;
        assert_eq!(fx.scheduling.list(&caller_for(&admin)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_excludes_itself_from_conflict_check() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let doctor = fx.register("doc", Role::Doctor).await;
        let patient = fx.register("pat", Role::Patient).await;
        let caller = caller_for(&admin);

        let first = fx.book(&admin, &doctor, &patient, date(2024, 1, 10), time(9, 0)).await;
        let second = fx.book(&admin, &doctor, &patient, date(2024, 1, 10), time(10, 0)).await;

        let onto_own_slot = AppointmentChanges {
            appointment_date: Some(first.appointment_date),
            appointment_time: Some(first.appointment_time),
            notes: Some("bring x-rays".into()),
            ..Default::default()
        };
        let updated = fx.scheduling.update(&caller, first.id, onto_own_slot).await.unwrap();
        assert_eq!(updated.notes.as_deref(), Some("bring x-rays"));

        let onto_taken_slot = AppointmentChanges {
            appointment_time: Some(time(9, 0)),
            ..Default::default()
        };
        assert!(matches!(
            fx.scheduling.update(&caller, second.id, onto_taken_slot).await,
            Err(AppError::Conflict(_))
        ));

        let onto_free_slot = AppointmentChanges {
            appointment_time: Some(time(11, 0)),
            ..Default::default()
        };
        let moved = fx.scheduling.update(&caller, second.id, onto_free_slot).await.unwrap();
        assert_eq!(moved.appointment_time, time(11, 0));
    }

    #[tokio::test]
    async fn status_change_scenario() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let doctor = fx.register("doc", Role::Doctor).await;
        let patient = fx.register("pat", Role::Patient).await;
        let booked = fx.book(&admin, &doctor, &patient, date(2024, 1, 10), time(9, 0)).await;
        let as_doctor = caller_for(&doctor);

        let done = fx.scheduling.set_status(&as_doctor, booked.id, "completed").await.unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);
        let reread = fx.scheduling.get(&as_doctor, booked.id).await.unwrap();
        assert_eq!(reread.status, AppointmentStatus::Completed);

        let err = fx.scheduling.set_status(&as_doctor, booked.id, "bogus").await.unwrap_err();
        assert!(err.fields().unwrap().contains_key("status"));

        // no transition graph: completed may go back to pending
        let back = fx.scheduling.set_status(&as_doctor, booked.id, "pending").await.unwrap();
        assert_eq!(back.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn status_change_needs_admin_or_assigned_doctor() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let doctor = fx.register("doc", Role::Doctor).await;
        let other = fx.register("other", Role::Doctor).await;
        let patient = fx.register("pat", Role::Patient).await;
        let booked = fx.book(&admin, &doctor, &patient, date(2024, 1, 10), time(9, 0)).await;

        assert!(matches!(
            fx.scheduling.set_status(&caller_for(&patient), booked.id, "cancelled").await,
            Err(AppError::Permission(_))
        ));
        assert!(matches!(
            fx.scheduling.set_status(&caller_for(&other), booked.id, "cancelled").await,
            Err(AppError::NotFound(_))
        ));
        assert!(fx
            .scheduling
            .set_status(&caller_for(&admin), booked.id, "confirmed")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn listing_is_scoped_by_role() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let d1 = fx.register("d1", Role::Doctor).await;
        let d2 = fx.register("d2", Role::Doctor).await;
        let p1 = fx.register("p1", Role::Patient).await;
        let p2 = fx.register("p2", Role::Patient).await;

        fx.book(&admin, &d1, &p1, date(2024, 1, 10), time(9, 0)).await;
        fx.book(&admin, &d1, &p2, date(2024, 1, 11), time(9, 0)).await;
        fx.book(&admin, &d2, &p2, date(2024, 1, 12), time(9, 0)).await;

        assert_eq!(fx.scheduling.list(&caller_for(&admin)).await.unwrap().len(), 3);

        let d1_list = fx.scheduling.list(&caller_for(&d1)).await.unwrap();
        let d1_id = fx.doctor_id(&d1).await;
        assert_eq!(d1_list.len(), 2);
        assert!(d1_list.iter().all(|a| a.doctor_id == d1_id));

        let p2_list = fx.scheduling.list(&caller_for(&p2)).await.unwrap();
        let p2_id = fx.patient_id(&p2).await;
        assert_eq!(p2_list.len(), 2);
        assert!(p2_list.iter().all(|a| a.patient_id == p2_id));

        // newest slot first
        assert_eq!(p2_list[0].appointment_date, date(2024, 1, 12));
    }

    #[tokio::test]
    async fn missing_profile_lists_nothing() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let doctor = fx.register("doc", Role::Doctor).await;
        let patient = fx.register("pat", Role::Patient).await;
        fx.book(&admin, &doctor, &patient, date(2024, 1, 10), time(9, 0)).await;

        sqlx::query("DELETE FROM patient_profiles WHERE identity_id = ?")
            .bind(patient.id)
            .execute(fx.db.pool())
            .await
            .unwrap();
        assert!(fx.scheduling.list(&caller_for(&patient)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn patient_books_for_self_only() {
        let fx = Fixture::new().await;
        let doctor = fx.register("doc", Role::Doctor).await;
        let me = fx.register("me", Role::Patient).await;
        let someone = fx.register("someone", Role::Patient).await;
        let doctor_id = fx.doctor_id(&doctor).await;

        let mine = NewAppointment {
            doctor: doctor_id,
            patient: None,
            appointment_date: date(2024, 2, 2),
            appointment_time: time(8, 15),
            reason: Some("checkup".into()),
            notes: None,
        };
        let booked = fx.scheduling.create(&caller_for(&me), mine).await.unwrap();
        assert_eq!(booked.patient_id, fx.patient_id(&me).await);
        assert_eq!(booked.doctor_name, "Dr. doc");

        let theirs = NewAppointment {
            doctor: doctor_id,
            patient: Some(fx.patient_id(&someone).await),
            appointment_date: date(2024, 2, 2),
            appointment_time: time(9, 15),
            reason: None,
            notes: None,
        };
        assert!(matches!(
            fx.scheduling.create(&caller_for(&me), theirs).await,
            Err(AppError::Permission(_))
        ));
    }

    #[tokio::test]
    async fn unknown_doctor_is_a_field_error() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let patient = fx.register("pat", Role::Patient).await;

        let booking = NewAppointment {
            doctor: 404,
            patient: Some(fx.patient_id(&patient).await),
            appointment_date: date(2024, 2, 2),
            appointment_time: time(8, 15),
            reason: None,
            notes: None,
        };
        let err = fx.scheduling.create(&caller_for(&admin), booking).await.unwrap_err();
        assert!(err.fields().unwrap().contains_key("doctor"));
    }

    #[tokio::test]
    async fn participants_may_delete_outsiders_may_not() {
        let fx = Fixture::new().await;
        let admin = fx.register("root", Role::Admin).await;
        let doctor = fx.register("doc", Role::Doctor).await;
        let patient = fx.register("pat", Role::Patient).await;
        let stranger = fx.register("stranger", Role::Patient).await;
        let booked = fx.book(&admin, &doctor, &patient, date(2024, 1, 10), time(9, 0)).await;

        assert!(matches!(
            fx.scheduling.delete(&caller_for(&stranger), booked.id).await,
            Err(AppError::NotFound(_))
        ));
        fx.scheduling.delete(&caller_for(&patient), booked.id).await.unwrap();
        assert!(fx.scheduling.list(&caller_for(&admin)).await.unwrap().is_empty());
    }
}
