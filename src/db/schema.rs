//! Table definitions. Every uniqueness invariant of the service is backed
//! by a constraint here so that racing writers are resolved by the store.

pub const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS identities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('admin', 'doctor', 'patient')),
        phone TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS doctor_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity_id INTEGER NOT NULL UNIQUE,
        specialization TEXT NOT NULL,
        license_number TEXT NOT NULL UNIQUE,
        experience_years INTEGER NOT NULL DEFAULT 0 CHECK (experience_years >= 0),
        consultation_fee TEXT NOT NULL DEFAULT '0.00',
        is_available BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        FOREIGN KEY (identity_id) REFERENCES identities(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS patient_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity_id INTEGER NOT NULL UNIQUE,
        date_of_birth TEXT,
        blood_group TEXT,
        address TEXT,
        emergency_contact TEXT,
        medical_history TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (identity_id) REFERENCES identities(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS appointments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        doctor_id INTEGER NOT NULL,
        patient_id INTEGER NOT NULL,
        appointment_date TEXT NOT NULL,
        appointment_time TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        reason TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (doctor_id, appointment_date, appointment_time),
        FOREIGN KEY (doctor_id) REFERENCES doctor_profiles(id) ON DELETE CASCADE,
        FOREIGN KEY (patient_id) REFERENCES patient_profiles(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS invoices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        appointment_id INTEGER NOT NULL UNIQUE,
        amount TEXT NOT NULL,
        tax TEXT NOT NULL DEFAULT '0',
        discount TEXT NOT NULL DEFAULT '0',
        total_amount TEXT NOT NULL,
        payment_status TEXT NOT NULL DEFAULT 'pending',
        payment_method TEXT,
        paid_at TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (appointment_id) REFERENCES appointments(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS prescriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        appointment_id INTEGER NOT NULL UNIQUE,
        diagnosis TEXT NOT NULL,
        medications TEXT NOT NULL DEFAULT '[]',
        instructions TEXT,
        follow_up_date TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (appointment_id) REFERENCES appointments(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id)",
];
