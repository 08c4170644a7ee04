pub(crate) const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS student_groups (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id           INTEGER,
        class_code         TEXT,
        serial_number      INTEGER,
        name               TEXT NOT NULL,
        class_room         TEXT,
        student_code       TEXT,
        national_id        TEXT NOT NULL UNIQUE,
        birth_date         TEXT,
        birth_day          INTEGER,
        birth_month        INTEGER,
        birth_year         INTEGER,
        birth_governorate  TEXT,
        gender             TEXT,
        religion           TEXT,
        nationality        TEXT,
        last_certificate   TEXT,
        last_school        TEXT,
        total_score        TEXT,
        guardian_name      TEXT,
        student_address    TEXT,
        stage              TEXT,
        orphan_status      TEXT,
        enrollment_status  TEXT,
        tablet_serial      TEXT,
        imei               TEXT,
        insurance_number   TEXT,
        enrollment_date    TEXT,
        notes              TEXT,
        FOREIGN KEY (group_id) REFERENCES student_groups(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transfer_requests (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id       INTEGER NOT NULL,
        from_school      TEXT NOT NULL,
        to_school        TEXT NOT NULL,
        transfer_reason  TEXT,
        request_date     TEXT NOT NULL,
        status           TEXT DEFAULT 'pending',
        FOREIGN KEY (student_id) REFERENCES students(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS national_id_placeholders (
        id INTEGER PRIMARY KEY AUTOINCREMENT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_students_national_id ON students(national_id)",
    "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
    "CREATE INDEX IF NOT EXISTS idx_students_group_id ON students(group_id)",
];
