// PSPP - a program for statistical analysis.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

use itertools::Itertools;

use crate::{
    calendar::parse_iso_date_time,
    data::Datum,
    format::{Decimal, Epoch, Format, Settings, Type, CC},
};

fn display(value: f64, format: Format, settings: &Settings) -> String {
    Datum::from(value)
        .display(format)
        .with_settings(settings)
        .to_string()
}

#[test]
fn basic() {
    let settings = Settings::default();
    let test = |value, type_, w, d, expected: &str| {
        let format = Format::new(type_, w, d).unwrap();
        assert_eq!(display(value, format, &settings), expected, "{format}");
    };
    test(1.5, Type::F, 8, 2, "    1.50");
    test(10.0, Type::F, 4, 0, "  10");
    test(1234567.0, Type::Comma, 12, 0, "   1,234,567");
    test(1234567.0, Type::Dot, 12, 0, "   1.234.567");
    test(50.0, Type::Pct, 6, 1, " 50.0%");
    test(12.5, Type::Dollar, 7, 2, " $12.50");
    test(12340.0, Type::E, 10, 3, "1.234E+004");
    test(1234567.0, Type::F, 6, 0, "1E+006");
    test(1e100, Type::F, 4, 0, "****");
    test(f64::INFINITY, Type::F, 10, 0, " +Infinity");
    test(3.0, Type::WkDay, 9, 0, "TUESDAY");
    test(12.0, Type::Month, 3, 0, "DEC");
}

#[test]
fn trimmed_and_missing() {
    assert_eq!(
        Datum::from(10.0)
            .display(Format::F40)
            .with_trimming()
            .to_string(),
        "10"
    );
    assert_eq!(
        Datum::sysmis().display(Format::F8_2).to_string(),
        "     .  "
    );
    assert_eq!(
        Datum::sysmis()
            .display(Format::F8_2)
            .with_trimming()
            .to_string(),
        "."
    );
    assert_eq!(
        Datum::from("abc ")
            .display(Format::F8_2)
            .with_trimming()
            .to_string(),
        "abc"
    );
}

#[test]
fn decimal_comma() {
    let settings = Settings::default().with_decimal(Decimal::Comma);
    assert_eq!(
        display(1234.5, Format::new(Type::Comma, 9, 1).unwrap(), &settings),
        "  1.234,5"
    );
    assert_eq!(
        display(1234.5, Format::new(Type::F, 7, 2).unwrap(), &settings),
        "1234,50"
    );
}

#[test]
fn leading_zeros() {
    struct Test {
        with_leading_zero: Settings,
        without_leading_zero: Settings,
    }

    impl Test {
        fn new() -> Self {
            Self {
                without_leading_zero: Settings::default(),
                with_leading_zero: Settings::default().with_leading_zero(true),
            }
        }

        fn test_with_settings(value: f64, expected: [&str; 2], settings: &Settings) {
            for (expected, d) in expected.into_iter().zip([2, 1].into_iter()) {
                assert_eq!(
                    &display(value, Format::new(Type::F, 5, d).unwrap(), settings),
                    expected
                );
            }
        }
        fn test(&self, value: f64, without: [&str; 2], with: [&str; 2]) {
            Self::test_with_settings(value, without, &self.without_leading_zero);
            Self::test_with_settings(value, with, &self.with_leading_zero);
        }
    }
    let test = Test::new();
    test.test(0.5, ["  .50", "   .5"], [" 0.50", "  0.5"]);
    test.test(0.99, ["  .99", "  1.0"], [" 0.99", "  1.0"]);
    test.test(0.01, ["  .01", "   .0"], [" 0.01", "  0.0"]);
    test.test(0.0, ["  .00", "   .0"], [" 0.00", "  0.0"]);
    test.test(-0.0, ["  .00", "   .0"], [" 0.00", "  0.0"]);
    test.test(-0.5, [" -.50", "  -.5"], ["-0.50", " -0.5"]);
    test.test(-0.99, [" -.99", " -1.0"], ["-0.99", " -1.0"]);
    test.test(-0.01, [" -.01", "   .0"], ["-0.01", "  0.0"]);
}

#[test]
fn non_ascii_cc() {
    fn test(settings: &Settings, value: f64, expected: &str) {
        assert_eq!(
            &display(value, Format::new(Type::CC(CC::A), 10, 2).unwrap(), settings),
            expected
        );
    }

    let settings = Settings::default().with_cc(CC::A, "«,¥,€,»".parse().unwrap());
    test(&settings, 1.0, "   ¥1.00€ ");
    test(&settings, -1.0, "  «¥1.00€»");
    test(&settings, 1.5, "   ¥1.50€ ");
    test(&settings, -1.5, "  «¥1.50€»");
    test(&settings, 0.75, "    ¥.75€ ");
    test(&settings, 1.5e10, " ¥2E+010€ ");
    test(&settings, -1.5e10, "«¥2E+010€»");
}

fn test_dates(format: Format, expect: &[&str]) {
    let settings = Settings::default().with_epoch(Epoch(1930));
    static INPUTS: &[&str; 6] = &[
        "1648-06-10T00:00:00",
        "1941-09-29T04:25:09.013",
        "1943-04-19T06:49:27.524",
        "1992-03-17T16:45:44.865",
        "1996-02-25T21:30:57.820",
        "2038-11-10T22:30:04.183",
    ];
    assert_eq!(expect.len(), INPUTS.len());
    for (input, expect) in INPUTS.iter().copied().zip_eq(expect.iter().copied()) {
        let value = parse_iso_date_time(input).unwrap();
        assert_eq!(&display(value, format, &settings), expect, "{input}");
    }
}

#[test]
fn date9() {
    test_dates(
        Format::new(Type::Date, 9, 0).unwrap(),
        &[
            "*********",
            "29-SEP-41",
            "19-APR-43",
            "17-MAR-92",
            "25-FEB-96",
            "*********",
        ],
    );
}

#[test]
fn date11() {
    test_dates(
        Format::new(Type::Date, 11, 0).unwrap(),
        &[
            "10-JUN-1648",
            "29-SEP-1941",
            "19-APR-1943",
            "17-MAR-1992",
            "25-FEB-1996",
            "10-NOV-2038",
        ],
    );
}

#[test]
fn adate10() {
    test_dates(
        Format::new(Type::ADate, 10, 0).unwrap(),
        &[
            "06/10/1648",
            "09/29/1941",
            "04/19/1943",
            "03/17/1992",
            "02/25/1996",
            "11/10/2038",
        ],
    );
}

#[test]
fn datetime17() {
    test_dates(
        Format::new(Type::DateTime, 17, 0).unwrap(),
        &[
            "10-JUN-1648 00:00",
            "29-SEP-1941 04:25",
            "19-APR-1943 06:49",
            "17-MAR-1992 16:45",
            "25-FEB-1996 21:30",
            "10-NOV-2038 22:30",
        ],
    );
}

#[test]
fn time() {
    let settings = Settings::default();
    let test = |value, w, d, expected: &str| {
        assert_eq!(
            display(value, Format::new(Type::Time, w, d).unwrap(), &settings),
            expected
        );
    };
    test(3723.0, 8, 0, "01:02:03");
    test(3723.0, 5, 0, "01:02");
    test(3723.25, 11, 2, "01:02:03.25");
}
